//! Schema module - Cell parameter schemas, errors and run configuration.

mod config;
mod error;
mod parameters;

pub use config::*;
pub use error::*;
pub use parameters::*;
