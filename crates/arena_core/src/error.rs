//! Error types for the arena AI core.
//!
//! The per-tick path never fails: missing components, invalid grids and
//! unreachable targets degrade to agents standing still. Errors only surface
//! from construction and configuration APIs.

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`ArenaError`].
pub type Result<T> = std::result::Result<T, ArenaError>;

/// Top-level error type for the arena AI core.
#[derive(Debug, Error)]
pub enum ArenaError {
    /// Configuration text could not be parsed.
    #[error("Failed to parse config '{source_name}': {message}")]
    ConfigParse {
        /// Name of the config source (file path or label).
        source_name: String,
        /// Error message from the parser.
        message: String,
    },

    /// Entity does not exist (never created, or destroyed).
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Map data is malformed.
    #[error("Invalid map: {0}")]
    InvalidMap(String),

    /// Spawn parameters were rejected.
    #[error("Invalid spawn: {0}")]
    InvalidSpawn(String),
}
