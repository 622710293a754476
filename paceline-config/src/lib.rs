//! Configuration for Paceline.
//!
//! Loads [`PacelineConfig`] from the environment, a file or defaults, and
//! installs the tracing subscriber every binary uses.

#![allow(missing_docs)]

pub mod error;
pub mod logging;
pub mod models;

pub use error::ConfigLoadError;
pub use logging::init_tracing;
pub use models::{ConfigSource, PacelineConfig};
