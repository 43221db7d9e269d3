//! Model infrastructure module
//!
//! Language-model providers behind one [`ModelClient`] trait.
//!
//! # Structure
//! - `types` - Request, Response, Error types
//! - `traits` - ModelClient trait
//! - `adapter` - Message and tool format adapters
//! - `clients` - Individual client implementations
//! - `factory` - Client construction from provider name
//! - `handle` - Role-tagged handles and the per-character model set
//! - `retry` - Generation with backoff on transient failures

pub mod adapter;
pub mod clients;
pub mod factory;
pub mod handle;
pub mod retry;
pub mod traits;
pub mod types;

pub use factory::{create_model, create_model_set};
pub use handle::{ModelHandle, ModelRole, ModelSet};
pub use retry::{GenerationError, RetryPolicy, generate_text};
pub use traits::ModelClient;
pub use types::{ModelError, ModelRequest, ModelResponse};
