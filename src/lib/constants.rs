//! Application constants
//!
//! Single source of truth for paths, protocol values and limits.

use std::time::Duration;

/// Directory (relative to the workspace) holding global and character configs
pub const CONFIG_DIR: &str = ".dewhale";

/// Global configuration file inside [`CONFIG_DIR`]
pub const GLOBAL_CONFIG_FILE: &str = "config.yaml";

/// Character definitions directory inside [`CONFIG_DIR`]
pub const CHARACTERS_DIR: &str = "characters";

/// Default environment file path
pub const ENV_PATH: &str = ".env";

/// MCP protocol revision announced during the handshake
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Client name announced during the handshake
pub const CLIENT_NAME: &str = "dewhale";

/// Upper bound for a single tool invocation routed through the hub
pub const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(600);

/// How long a stream transport waits for the server's `endpoint` event
pub const STREAM_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a freshly opened tool server may take to answer `initialize`
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Concurrent inbound requests (sampling) handled per connection
pub const INBOUND_REQUEST_LIMIT: usize = 4;

/// Prefix of every comment the agent posts
pub const COMMENT_PREFIX: &str = "[Dewhale]";

/// Label that opts an issue into scheduled runs
pub const SCHEDULE_LABEL: &str = "schedule";

/// Initial backoff between retried model calls
pub const RETRY_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Default endpoints of the model providers (overridable through the environment)
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default code-hosting API endpoints
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITLAB_HOST: &str = "https://gitlab.com";
