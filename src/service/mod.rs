// Service module - turns one request into one response

pub mod server;

use crate::error::RouteError;
use crate::protocol::{Response, RouteRequest, codec};
use crate::routes::authz::AuthorizationTable;
use crate::routes::installer::RouteInstaller;

/// Decides and applies the routes for each request.
///
/// Networks are installed in table order. The first failing install stops
/// the sequence and the whole request fails; routes installed before it
/// are left in place since a later retry replaces them anyway.
pub struct RouteService<I> {
    table: AuthorizationTable,
    installer: I,
}

impl<I: RouteInstaller> RouteService<I> {
    pub fn new(table: AuthorizationTable, installer: I) -> Self {
        RouteService { table, installer }
    }

    pub fn table(&self) -> &AuthorizationTable {
        &self.table
    }

    /// Handle one raw message. Always yields exactly one response.
    pub async fn handle_message(&self, message: &[u8]) -> Response {
        match codec::decode_request(message) {
            Ok(request) => self.handle_request(&request).await,
            Err(e) => {
                tracing::warn!("Rejecting malformed request: {}", e);
                Response::Failure(e.into())
            }
        }
    }

    pub async fn handle_request(&self, request: &RouteRequest) -> Response {
        let response = Response::from(self.apply(request).await);
        match response {
            Response::Success => tracing::info!(dn = %request.dn, "Routes installed"),
            Response::Failure(e) => tracing::warn!(dn = %request.dn, "Request refused: {}", e),
        }
        response
    }

    async fn apply(&self, request: &RouteRequest) -> Result<(), RouteError> {
        let networks = self.table.lookup(&request.dn)?;
        tracing::debug!(
            dn = %request.dn,
            interface = %request.interface,
            "Installing {} authorized network(s)",
            networks.len()
        );

        for (index, network) in networks.iter().enumerate() {
            let route = request.route_for(*network);
            if let Err(e) = self.installer.replace_route(&route).await {
                tracing::error!(
                    "Route {} of {} ({}) failed: {}",
                    index + 1,
                    networks.len(),
                    network,
                    e
                );
                return Err(e.into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::error::InstallError;
    use crate::routes::RouteSpec;
    use crate::routes::installer::RouteInstaller;

    /// Records every route it is asked to install, failing on request.
    #[derive(Default)]
    pub struct RecordingInstaller {
        pub calls: Mutex<Vec<RouteSpec>>,
        pub fail_on_call: Option<usize>,
    }

    impl RecordingInstaller {
        pub fn failing_on(call: usize) -> Self {
            RecordingInstaller {
                calls: Mutex::new(Vec::new()),
                fail_on_call: Some(call),
            }
        }

        pub fn calls(&self) -> Vec<RouteSpec> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RouteInstaller for RecordingInstaller {
        async fn replace_route(&self, route: &RouteSpec) -> Result<(), InstallError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(route.clone());
                calls.len() - 1
            };

            if self.fail_on_call == Some(call) {
                return Err(InstallError::TimedOut {
                    command: "ip route replace".to_string(),
                    timeout: Duration::from_secs(1),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingInstaller;
    use super::*;
    use std::net::Ipv4Addr;

    fn table() -> AuthorizationTable {
        AuthorizationTable::new([
            (
                "centos-gw".to_string(),
                vec!["192.168.178.0/24".parse().unwrap()],
            ),
            (
                "branch".to_string(),
                vec![
                    "10.20.0.0/16".parse().unwrap(),
                    "10.30.1.0/24".parse().unwrap(),
                    "10.40.0.0/16".parse().unwrap(),
                ],
            ),
            ("revoked".to_string(), vec![]),
        ])
    }

    #[tokio::test]
    async fn test_single_network_success() {
        let service = RouteService::new(table(), RecordingInstaller::default());
        let response = service
            .handle_message(br#"{"DN":"centos-gw","Interface":"eth0","NextHop":null}"#)
            .await;

        assert_eq!(response, Response::Success);
        let calls = service.installer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].network.to_string(), "192.168.178.0/24");
        assert_eq!(calls[0].interface, "eth0");
        assert_eq!(calls[0].next_hop, None);
    }

    #[tokio::test]
    async fn test_every_network_installed_in_order() {
        let service = RouteService::new(table(), RecordingInstaller::default());
        let response = service
            .handle_message(br#"{"DN":"branch","Interface":"tun0","NextHop":"10.8.0.1"}"#)
            .await;

        assert_eq!(response, Response::Success);
        let calls = service.installer.calls();
        let networks: Vec<String> = calls.iter().map(|r| r.network.to_string()).collect();
        assert_eq!(networks, vec!["10.20.0.0/16", "10.30.1.0/24", "10.40.0.0/16"]);
        assert!(calls.iter().all(|r| r.next_hop == Some(Ipv4Addr::new(10, 8, 0, 1))));
        assert!(calls.iter().all(|r| r.interface == "tun0"));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let service = RouteService::new(table(), RecordingInstaller::default());
        let response = service
            .handle_message(br#"{"DN":"unknown-host","Interface":"eth0"}"#)
            .await;

        assert_eq!(response, Response::Failure(RouteError::UnknownUser));
        assert!(service.installer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_routes() {
        let service = RouteService::new(table(), RecordingInstaller::default());
        let response = service
            .handle_message(br#"{"DN":"revoked","Interface":"eth0"}"#)
            .await;

        assert_eq!(response, Response::Failure(RouteError::NoRoutes));
        assert!(service.installer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_format_errors_skip_lookup_and_install() {
        let service = RouteService::new(table(), RecordingInstaller::default());

        let messages: [&[u8]; 5] = [
            b"{not json",
            br#"{"DN":"centos-gw","Interface":"eth0","Extra!":"x"}"#,
            br#"{"DN":"centos-gw","Interface":"eth0","Network":"0.0.0.0/0"}"#,
            br#"{"DN":"centos-gw"}"#,
            br#""centos-gw""#,
        ];
        for message in messages {
            assert_eq!(
                service.handle_message(message).await,
                Response::Failure(RouteError::Format)
            );
        }
        assert!(service.installer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_failure() {
        let service = RouteService::new(table(), RecordingInstaller::failing_on(0));
        let response = service
            .handle_message(br#"{"DN":"centos-gw","Interface":"eth0"}"#)
            .await;

        assert_eq!(response, Response::Failure(RouteError::Process));
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_installs() {
        let service = RouteService::new(table(), RecordingInstaller::failing_on(1));
        let response = service
            .handle_message(br#"{"DN":"branch","Interface":"tun0"}"#)
            .await;

        assert_eq!(response, Response::Failure(RouteError::Process));
        assert_eq!(service.installer.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_request_issues_identical_routes() {
        let service = RouteService::new(table(), RecordingInstaller::default());
        let message = br#"{"DN":"centos-gw","Interface":"eth0","NextHop":"192.168.1.1"}"#;

        assert_eq!(service.handle_message(message).await, Response::Success);
        assert_eq!(service.handle_message(message).await, Response::Success);

        let calls = service.installer.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }
}
