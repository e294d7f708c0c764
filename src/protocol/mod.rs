// Protocol module - wire messages exchanged between client and service

pub mod codec;
pub mod validate;

use serde::Deserialize;
use std::net::Ipv4Addr;

use crate::error::RouteError;
use crate::routes::{Ipv4Network, RouteSpec};

pub const FIELD_DN: &str = "DN";
pub const FIELD_INTERFACE: &str = "Interface";
pub const FIELD_NEXT_HOP: &str = "NextHop";
pub const FIELD_SOURCE_IP: &str = "SourceIP";

/// The only keys a request may carry.
pub const RECOGNIZED_FIELDS: [&str; 4] = [FIELD_DN, FIELD_INTERFACE, FIELD_NEXT_HOP, FIELD_SOURCE_IP];

/// A decoded and validated request to install the routes of a DN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    pub dn: String,
    pub interface: String,
    pub next_hop: Option<Ipv4Addr>,
    pub source_ip: Option<Ipv4Addr>,
}

impl RouteRequest {
    /// The route to install for one of this DN's authorized networks.
    pub fn route_for(&self, network: Ipv4Network) -> RouteSpec {
        RouteSpec {
            network,
            interface: self.interface.clone(),
            next_hop: self.next_hop,
            source: self.source_ip,
        }
    }
}

/// The single answer the service sends for each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Success,
    Failure(RouteError),
}

impl From<Result<(), RouteError>> for Response {
    fn from(result: Result<(), RouteError>) -> Self {
        match result {
            Ok(()) => Response::Success,
            Err(e) => Response::Failure(e),
        }
    }
}

/// A response as the caller sees it: the reason is free text because the
/// caller does not have to know every error the service can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Success,
    Failure(String),
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(rename = "Status")]
    status: String,

    #[serde(rename = "Error", default)]
    error: Option<String>,
}
