//! Parsing, validation, and resolution of `paste.toml` pipeline configuration.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`PasteConfig`], then resolves it against the project directory into the
//! absolute, read-only [`Env`] every build pass consumes.

#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use env::{CompressorCommand, Env};
pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::resolve_env;
pub use types::*;
