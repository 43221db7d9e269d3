use clap::Parser;
use dewhale::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match dewhale::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "dewhale failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
