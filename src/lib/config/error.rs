use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config from {path:?} is not a mapping")]
    NotAMapping { path: PathBuf },

    #[error("invalid configuration: {source}")]
    Invalid {
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required field 'name' in character configuration")]
    MissingName,

    #[error("unsupported platform type '{0}' (expected 'github' or 'gitlab')")]
    UnsupportedPlatform(String),
}
