pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clstamp-proxy")]
#[command(author, version, about = "Session-scoped proxy for the storage and stamping webhook API")]
pub struct Cli {
    /// Path to config file (checked in order: local config.toml, ~/.config/clstamp-proxy/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Start {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration and whether the server is reachable
    Status,

    /// Upload a file with the environment credentials and stamp it
    Upload {
        /// File to upload
        path: PathBuf,

        /// Target group
        #[arg(short, long, default_value = "Uploads")]
        group: String,

        /// Network (public, private, all); defaults to API_NETWORK
        #[arg(short, long)]
        network: Option<String>,

        /// Upload without stamping immediately
        #[arg(long)]
        no_stamp: bool,

        /// Ask the API to export claim links
        #[arg(long)]
        export_links: bool,
    },

    /// Generate a random SESSION_SECRET
    GenerateSecret,
}
