use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use privroute::client::{RouteClient, request_from_env};
use privroute::config::parse_log_level;
use privroute::protocol::Reply;

/// Contacts a privroute service and asks it to add the routes for a DN.
/// Routes cannot be chosen by the client, only the DN is sent.
#[derive(Parser, Debug)]
#[command(name = "privroute-client")]
#[command(author, version, about, long_about = None)]
struct ClientArgs {
    /// IP address of the privroute service
    #[arg(short = 's', long = "ip", default_value = "127.0.0.1", env = "PRIVROUTE_IP")]
    ip: String,

    /// TCP port of the privroute service
    #[arg(short, long, default_value = "6001", env = "PRIVROUTE_PORT")]
    port: u16,

    /// Seconds to wait for the reply
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// DN to report instead of $common_name
    #[arg(long)]
    dn: Option<String>,

    /// Interface to report instead of $dev
    #[arg(long)]
    interface: Option<String>,

    /// Next hop to report instead of $route_gateway
    #[arg(long)]
    next_hop: Option<Ipv4Addr>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Arguments OpenVPN appends to hook scripts (verb, address, common name); ignored
    #[arg(num_args = 0..=3, hide = true)]
    hook_args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = ClientArgs::parse();
    privroute::logging::init(parse_log_level(&args.log_level)?);
    tracing::debug!("Ignoring hook arguments: {:?}", args.hook_args);

    let env = |name: &str| {
        let value = std::env::var(name).ok();
        match name {
            privroute::client::ENV_COMMON_NAME => args.dn.clone().or(value),
            privroute::client::ENV_DEVICE => args.interface.clone().or(value),
            privroute::client::ENV_ROUTE_GATEWAY => {
                args.next_hop.map(|ip| ip.to_string()).or(value)
            }
            _ => value,
        }
    };
    let request = request_from_env(env)?;

    let client = RouteClient::new(args.ip, args.port, Duration::from_secs(args.timeout));
    match client.send(&request).await {
        Ok(Reply::Success) => {
            eprintln!("Successfully added routes.");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Reply::Failure(reason)) => {
            eprintln!("An error occured when trying to add the routes: {}", reason);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            eprintln!("Failed to contact privroute: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
