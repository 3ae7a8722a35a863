use clap::Parser;

mod cli;

use clstamp_core::config::load_config;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up API_* / SESSION_SECRET / PORT from a local .env
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load configuration (file, then environment) before logging so that
    // `[logging] level` can seed the filter
    let config = load_config(cli.config)?;

    // Initialize logging; RUST_LOG still adds or overrides directives
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in config.logging.directives() {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {:?}", path);
    }

    match cli.command {
        Commands::Start { port } => {
            cli::commands::start::run(config, port).await?;
        }
        Commands::Status => {
            cli::commands::status::run(config).await?;
        }
        Commands::Upload {
            path,
            group,
            network,
            no_stamp,
            export_links,
        } => {
            cli::commands::upload::run(config, path, group, network, !no_stamp, export_links).await?;
        }
        Commands::GenerateSecret => {
            cli::commands::generate_secret::run();
        }
    }

    Ok(())
}
