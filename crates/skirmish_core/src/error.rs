//! Error types for the simulation core.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for simulation failures.
///
/// Invalid entity references are not errors: commands that name a missing
/// or inactive entity are no-ops that report `false`/`None` instead.
#[derive(Debug, Error)]
pub enum SimError {
    /// The registry already holds the configured maximum number of entities.
    #[error("Entity cap reached ({cap} entities)")]
    EntityCapReached {
        /// Configured maximum.
        cap: usize,
    },

    /// A second player was requested while one is still active.
    #[error("A player already exists (entity {0})")]
    PlayerAlreadySpawned(u64),

    /// A configuration value is outside its allowed range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration file could not be read.
    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigIo {
        /// Path that failed to load.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
