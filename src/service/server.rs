// TCP request-reply loop

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::Instrument;
use uuid::Uuid;

use super::RouteService;
use crate::error::{AppResult, RouteError};
use crate::protocol::{Response, codec};
use crate::routes::installer::RouteInstaller;

pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// How long a connection may sit idle before it is dropped
    pub request_timeout: Duration,
    pub max_message_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            request_timeout: Duration::from_secs(30),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

/// Serves one connection, and one request on it, at a time. Every message
/// read gets exactly one reply before the next message is read.
pub struct RouteServer {
    listener: TcpListener,
    options: ServerOptions,
}

impl RouteServer {
    pub async fn bind(addr: impl ToSocketAddrs, options: ServerOptions) -> AppResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(RouteServer { listener, options })
    }

    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run<I: RouteInstaller>(self, service: &RouteService<I>) -> AppResult<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!("Connection from {}", peer);
                    self.serve_connection(stream, peer, service).await;
                    tracing::debug!("Connection from {} closed", peer);
                }
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    /// Idle -> awaiting a request -> processing it -> idle, until the peer
    /// hangs up, goes quiet or sends an oversized line.
    async fn serve_connection<I: RouteInstaller>(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        service: &RouteService<I>,
    ) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let max = self.options.max_message_bytes;

        loop {
            let mut line = Vec::new();
            // Room for the message plus a CRLF terminator
            let mut limited = (&mut reader).take(max as u64 + 2);
            let read = limited.read_until(codec::DELIMITER, &mut line);
            match tokio::time::timeout(self.options.request_timeout, read).await {
                Ok(Ok(0)) => break,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!("Failed to read from {}: {}", peer, e);
                    break;
                }
                Err(_) => {
                    tracing::debug!("Closing idle connection from {}", peer);
                    break;
                }
            }

            let message = codec::unframe(&line);
            let truncated = line.len() > max && !line.ends_with(&[codec::DELIMITER]);
            let oversized = truncated || message.len() > max;

            let span = tracing::info_span!("request", id = %Uuid::new_v4(), peer = %peer);
            let response = async {
                if oversized {
                    tracing::warn!("Rejecting message longer than {} bytes", max);
                    Response::Failure(RouteError::Format)
                } else {
                    tracing::debug!("Received {}", String::from_utf8_lossy(message));
                    service.handle_message(message).await
                }
            }
            .instrument(span)
            .await;

            let reply = codec::frame(codec::encode_response(&response));
            if let Err(e) = write_half.write_all(&reply).await {
                tracing::warn!("Failed to send reply to {}: {}", peer, e);
                break;
            }

            // The rest of an oversized line is still in flight
            if oversized {
                break;
            }
        }
    }
}
