//! # Application Module
//!
//! The agent's behaviour on top of the configuration, model and platform
//! layers.
//!
//! ## Submodules
//!
//! - [`tooling`] - Connections to MCP tool servers and the hub over them
//! - [`agent`] - Bounded multi-step tool calling and step reporting
//! - [`character`] - One configured persona and its per-issue lifecycle
//! - [`driver`] - Trigger event to character runs

pub mod agent;
pub mod character;
pub mod driver;
pub mod tooling;

pub use character::Character;
pub use driver::{Driver, RunSummary};
