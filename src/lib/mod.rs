pub mod application;
pub mod cli;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;
pub mod platform;

pub use application::{agent, tooling};
pub use cli::Cli;
pub use domain::types;
pub use infrastructure::{model, rpc};

use application::{Character, Driver};
use config::{ConfigError, Environment, load_characters};
use platform::{PlatformError, create_platform, read_trigger_event};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    init_tracing(cli.quiet);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting dewhale");
    debug!(workspace = ?cli.workspace, event = ?cli.event, "CLI arguments parsed");

    let mut env = Environment::from_env()?;
    if let Some(workspace) = cli.workspace {
        env = env.with_workspace(workspace);
    }
    if let Some(event) = cli.event {
        env = env.with_event_path(event);
    }
    info!(
        platform = ?env.platform,
        owner = %env.context.owner,
        repo = %env.context.repo,
        workspace = %env.context.workspace.display(),
        "Environment loaded"
    );

    let configs = load_characters(&env.context.workspace, &env.substitutions)?;
    let Some(event) = read_trigger_event(&env)? else {
        warn!("No supported trigger event, nothing to do");
        return Ok(());
    };

    let platform = create_platform(&env)?;
    let mut characters = Vec::with_capacity(configs.len());
    for config in configs {
        let name = config.name.clone();
        match Character::from_config(config, &env.providers, env.context.clone(), platform.clone()) {
            Ok(character) => characters.push(character),
            Err(err) => error!(character = %name, %err, "Cannot create character models"),
        }
    }

    let mut driver = Driver::new(platform, characters, env.context.clone());
    let summary = driver.handle(&event).await?;
    info!(
        issues = summary.issues,
        skipped = summary.skipped,
        runs = summary.runs,
        failures = summary.failures,
        "Run finished"
    );
    Ok(())
}

fn init_tracing(quiet: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = if quiet {
            EnvFilter::new("off")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
