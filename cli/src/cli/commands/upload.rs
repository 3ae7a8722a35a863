use std::path::PathBuf;
use std::time::Duration;

use clstamp_core::config::Config;
use clstamp_core::models::Network;
use clstamp_core::proxy::error::translate;
use clstamp_core::proxy::upstream::commands::{self, FilePart, UploadOptions};
use clstamp_core::proxy::{CredentialStore, UpstreamClient};

/// One-shot upload using the environment credentials
pub async fn run(
    config: Config,
    path: PathBuf,
    group: String,
    network: Option<String>,
    stamp_immediately: bool,
    export_links: bool,
) -> anyhow::Result<()> {
    let store = CredentialStore::from_config(&config.credentials);
    let Some(credentials) = store.environment() else {
        anyhow::bail!("API credentials not configured. Please set API_KEY and API_SECRET (environment or .env file).");
    };

    let network: Network = match network {
        Some(n) => n.parse()?,
        None => credentials.network,
    };

    if !path.is_file() {
        anyhow::bail!("File not found: {:?}", path);
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
        .to_string();
    let bytes = tokio::fs::read(&path).await?;

    let upstream = UpstreamClient::new(
        config.base_url()?,
        Duration::from_secs(config.upstream.request_timeout),
        Duration::from_secs(config.upstream.gateway_timeout),
    )?;

    let command = commands::upload_file(
        credentials,
        &group,
        network,
        FilePart {
            file_name: file_name.clone(),
            content_type: None,
            bytes: bytes.into(),
        },
        UploadOptions {
            stamp_immediately: Some(stamp_immediately),
            export_links: export_links.then_some(true),
        },
    );

    tracing::info!("Uploading {} to group {} on {}", file_name, group, network);
    let response = translate(upstream.execute(&credentials.api_key, command).await?)?;
    let data = response.body;

    let hash = data.get("hash").and_then(|v| v.as_str()).unwrap_or("?");
    println!("✅ Uploaded {} ({})", file_name, hash);
    if let Some(message) = data.get("message").and_then(|v| v.as_str()) {
        println!("   {}", message);
    }
    if let Some(stamped) = data.get("files_stamped").filter(|v| !v.is_null()) {
        println!("✅ Stamped {} files", stamped);
    }
    if let Some(link) = data.pointer("/data/claim_link").and_then(|v| v.as_str()) {
        println!("   Claim link: {}", link);
    }

    Ok(())
}
