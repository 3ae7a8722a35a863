use clstamp_core::config::Config;
use clstamp_core::proxy::ProxyServer;

pub async fn run(mut config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    // Apply port override if provided
    if let Some(port) = port_override {
        config.server.port = port;
    }

    tracing::info!("Starting clstamp proxy...");
    tracing::info!("  Port: {}", config.server.port);
    tracing::info!("  Host: {}", config.server.bind_address());
    tracing::info!("  Upstream: {}", config.base_url()?);
    tracing::info!("  CORS origin: {}", config.server.cors_origin);

    let server = ProxyServer::new(&config)?;

    tracing::info!(
        "Proxy server starting on http://{}:{}",
        config.server.bind_address(),
        config.server.port
    );
    tracing::info!("Press Ctrl+C to stop");

    // Run server (blocks until shutdown)
    server.run().await?;

    Ok(())
}
