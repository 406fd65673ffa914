//! Configuration for the wikiapi client.
//!
//! This crate provides the configuration types read from
//! `.wikiapi/config.yaml`, the loader that expands `${VAR}` references, and
//! environment variable overrides.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
