// Routes module - authorized networks and route installation

pub mod authz;
pub mod installer;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::AppError;

/// An IPv4 network in CIDR notation. Host bits are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Network(Ipv4Net);

impl Ipv4Network {
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, AppError> {
        let net = Ipv4Net::new(addr, prefix_len).map_err(|e| AppError::InvalidNetwork {
            network: format!("{}/{}", addr, prefix_len),
            reason: e.to_string(),
        })?;
        Self::try_from(net)
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.0.network()
    }

    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }
}

impl TryFrom<Ipv4Net> for Ipv4Network {
    type Error = AppError;

    fn try_from(net: Ipv4Net) -> Result<Self, Self::Error> {
        if net.trunc() != net {
            return Err(AppError::InvalidNetwork {
                network: net.to_string(),
                reason: "host bits set".to_string(),
            });
        }
        Ok(Ipv4Network(net))
    }
}

impl From<Ipv4Network> for Ipv4Net {
    fn from(network: Ipv4Network) -> Self {
        network.0
    }
}

impl FromStr for Ipv4Network {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| AppError::InvalidNetwork {
            network: s.to_string(),
            reason,
        };

        // No prefix length means a single host
        let net = if s.contains('/') {
            s.parse::<Ipv4Net>().map_err(|e| invalid(e.to_string()))?
        } else {
            let addr: Ipv4Addr = s.parse().map_err(|e| invalid(format!("{}", e)))?;
            Ipv4Net::from(addr)
        };

        Self::try_from(net)
    }
}

impl TryFrom<String> for Ipv4Network {
    type Error = AppError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Network> for String {
    fn from(network: Ipv4Network) -> Self {
        network.to_string()
    }
}

impl fmt::Display for Ipv4Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One fully resolved route to hand to a [`installer::RouteInstaller`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub network: Ipv4Network,
    pub interface: String,
    pub next_hop: Option<Ipv4Addr>,
    pub source: Option<Ipv4Addr>,
}
