use clstamp_core::config::{default_config_path, Config};
use clstamp_core::proxy::credentials::redact;

pub async fn run(config: Config) -> anyhow::Result<()> {

    println!("clstamp Proxy Status");
    println!("====================");
    println!();
    println!("Configuration:");
    println!("  Config file: {:?}", default_config_path());
    println!(
        "  Upstream: {}",
        config.upstream.base_url.as_deref().unwrap_or("(not set)")
    );
    println!();
    println!("Server settings:");
    println!("  Host: {}", config.server.bind_address());
    println!("  Port: {}", config.server.port);
    println!("  CORS origin: {}", config.server.cors_origin);
    println!("  Session lifetime: {}s", config.session.max_age_secs);
    println!("  Log level: {}", config.logging.level);
    println!(
        "  Session secret: {}",
        if config.session.secret.is_some() { "set" } else { "ephemeral" }
    );
    println!();

    println!("Credentials:");
    match (&config.credentials.api_key, &config.credentials.api_secret) {
        (Some(key), Some(_)) => {
            println!("  Source: environment");
            println!("  API key: {}", redact(key));
            println!("  Network: {}", config.credentials.network);
        }
        _ => println!("  Source: session (configured from the browser)"),
    }

    // Check if server is reachable
    println!();
    let url = format!(
        "http://{}:{}/healthz",
        config.server.host, config.server.port
    );
    match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => {
            println!("Server: RUNNING ✓");
        }
        _ => {
            println!("Server: NOT RUNNING");
        }
    }

    Ok(())
}
