pub mod character;
pub mod environment;
pub mod error;
pub mod loader;
pub mod merge;
pub mod server;

pub use character::{
    CharacterConfig, LlmConfig, McpConfig, ModelPreferenceConfig, ModelRef, Permissions,
    default_config,
};
pub use environment::{Environment, PlatformKind, ProviderSettings, RunContext};
pub use error::ConfigError;
pub use loader::{load_characters, load_global_config};
pub use merge::merge;
pub use server::ServerDescriptor;
