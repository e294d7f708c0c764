use privroute::config::Config;
use privroute::routes::installer::IpRouteInstaller;
use privroute::service::RouteService;
use privroute::service::server::RouteServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    // Initialize logging
    privroute::logging::init(config.log_level);
    tracing::info!("privroute starting...");

    // Get hostname
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    tracing::info!("Host: {}", hostname);
    tracing::info!("Loaded configuration from: {}", config.source.display());

    let installer = IpRouteInstaller::new(config.ip_command.clone(), config.install_timeout);
    let service = RouteService::new(config.authorization.clone(), installer);

    if service.table().is_empty() {
        tracing::warn!("Authorization table is empty, every request will be refused");
    } else {
        tracing::info!("{} DN(s) authorized", service.table().len());
    }

    let server = RouteServer::bind(
        (config.bind_address.as_str(), config.port),
        config.server_options(),
    )
    .await?;
    tracing::info!("Listening on {}", server.local_addr()?);

    tokio::select! {
        result = server.run(&service) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, shutting down"),
    }

    Ok(())
}
