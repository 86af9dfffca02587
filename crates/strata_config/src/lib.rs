//! Parsing and validation of `strata.toml` optimizer configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`OptimizerConfig`]. Every section is optional; missing values fall back to
//! the defaults the optimizer was tuned with. Command-line overrides are merged
//! on top by [`resolve_config`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{resolve_config, Overrides};
pub use types::*;
