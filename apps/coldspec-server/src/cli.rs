//! Command line arguments.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "coldspec-server", about = "Product catalog ingestion and retrieval service")]
pub struct Args {
    /// Bind host; overrides the configured value.
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port; overrides the configured value.
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to a configuration file; environment variables still override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit JSON logs instead of human-readable output.
    #[arg(long)]
    pub json_logs: bool,
}
