//! Configuration system for Nebula terrain generation.
//!
//! Provides runtime-configurable planet, generation and logging settings that
//! persist to disk as RON files. Supports CLI overrides via clap, hot-reload
//! detection, and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, ConfigOrigin, DebugConfig, GenerationConfig, PlanetConfig, PropConfig};
pub use error::ConfigError;
