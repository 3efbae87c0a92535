use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Parley tool-calling gateway
#[derive(Debug, Parser)]
#[command(
    name = "parley",
    about = "OpenAI-compatible chat completions with tool calling over a prompt-only backend"
)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "parley.toml", env = "PARLEY_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "PARLEY_LISTEN")]
    pub listen: Option<SocketAddr>,
}
