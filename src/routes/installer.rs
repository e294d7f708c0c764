// Route installation through the system `ip` command

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::RouteSpec;
use crate::error::InstallError;

/// The privileged capability: point the kernel's route for one network at
/// an interface, overwriting whatever route was there before.
pub trait RouteInstaller: Send + Sync {
    fn replace_route(
        &self,
        route: &RouteSpec,
    ) -> impl Future<Output = Result<(), InstallError>> + Send;
}

/// Installs routes by running `ip route replace`.
///
/// `replace` rather than `add` makes repeated installs of the same route a
/// no-op and lets a new interface or next hop overwrite an old one.
#[derive(Debug, Clone)]
pub struct IpRouteInstaller {
    command: PathBuf,
    timeout: Duration,
}

impl IpRouteInstaller {
    pub fn new(command: impl Into<PathBuf>, timeout: Duration) -> Self {
        IpRouteInstaller {
            command: command.into(),
            timeout,
        }
    }
}

/// Arguments for `ip` that replace the route described by `route`.
pub fn replace_args(route: &RouteSpec) -> Vec<String> {
    let mut args = vec![
        "route".to_string(),
        "replace".to_string(),
        route.network.to_string(),
        "dev".to_string(),
        route.interface.clone(),
    ];

    if let Some(next_hop) = route.next_hop {
        args.push("via".to_string());
        args.push(next_hop.to_string());
    }

    if let Some(source) = route.source {
        args.push("src".to_string());
        args.push(source.to_string());
    }

    args
}

impl RouteInstaller for IpRouteInstaller {
    async fn replace_route(&self, route: &RouteSpec) -> Result<(), InstallError> {
        let args = replace_args(route);
        let command_line = format!("{} {}", self.command.display(), args.join(" "));
        tracing::info!("Running {}", command_line);

        let mut command = Command::new(&self.command);
        command.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        // Dropping the output future on timeout kills the child
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(InstallError::Spawn {
                    command: command_line,
                    source,
                });
            }
            Err(_) => {
                return Err(InstallError::TimedOut {
                    command: command_line,
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(InstallError::ExitStatus {
                command: command_line,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::debug!("Replaced route to {} via {}", route.network, route.interface);
        Ok(())
    }
}
