use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(
    name = "dewhale",
    version,
    about = "Answers issues with language models and MCP tool servers"
)]
pub struct Cli {
    /// Repository checkout holding `.dewhale/`; defaults to the CI workspace
    #[arg(long, short)]
    pub workspace: Option<PathBuf>,
    /// Event payload to use instead of the one named by the CI environment
    #[arg(long)]
    pub event: Option<PathBuf>,
    /// Disable logging
    #[arg(long, short)]
    pub quiet: bool,
}
