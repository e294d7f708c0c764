// Unprivileged side: report a connected VPN client to the route service

use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{AppError, AppResult};
use crate::protocol::{Reply, RouteRequest, codec};
use crate::service::server::DEFAULT_MAX_MESSAGE_BYTES;

/// OpenVPN environment variables a connect hook sees
pub const ENV_COMMON_NAME: &str = "common_name";
pub const ENV_DEVICE: &str = "dev";
pub const ENV_ROUTE_GATEWAY: &str = "route_gateway";

pub struct RouteClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl RouteClient {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        RouteClient {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Send one request and wait for its reply.
    pub async fn send(&self, request: &RouteRequest) -> AppResult<Reply> {
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| AppError::Timeout(self.timeout))?
    }

    async fn exchange(&self, request: &RouteRequest) -> AppResult<Reply> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        tracing::debug!("Connected to {}:{}", self.host, self.port);

        stream
            .write_all(&codec::frame(codec::encode_request(request)))
            .await?;

        let mut reader = BufReader::new(stream).take(DEFAULT_MAX_MESSAGE_BYTES as u64);
        let mut line = Vec::new();
        if reader.read_until(codec::DELIMITER, &mut line).await? == 0 {
            return Err(AppError::Protocol(
                "connection closed before a reply arrived".to_string(),
            ));
        }

        codec::decode_reply(codec::unframe(&line))
    }
}

/// Build a request from the environment OpenVPN hands its hook scripts.
///
/// `var` looks up one variable; an empty value counts as unset.
pub fn request_from_env<F>(var: F) -> AppResult<RouteRequest>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| var(name).filter(|value| !value.is_empty());
    let require = |name: &str| {
        get(name).ok_or_else(|| AppError::Config(format!("environment variable {} is not set", name)))
    };

    let next_hop = match get(ENV_ROUTE_GATEWAY) {
        Some(gateway) => Some(gateway.parse::<Ipv4Addr>().map_err(|_| {
            AppError::Config(format!("{} is not an IPv4 address: {}", ENV_ROUTE_GATEWAY, gateway))
        })?),
        None => None,
    };

    Ok(RouteRequest {
        dn: require(ENV_COMMON_NAME)?,
        interface: require(ENV_DEVICE)?,
        next_hop,
        source_ip: None,
    })
}
