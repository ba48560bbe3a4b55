//! Core error model.

use thiserror::Error;

/// Result type used across the engine's domain layer.
pub type CoreResult<T> = Result<T, CoreError>;

/// Core-level error.
///
/// Keep this focused on deterministic parse/validation failures.
/// Infrastructure concerns belong to the store and sync layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// An action name outside the closed action vocabulary.
    #[error("unknown action: {0}")]
    UnknownAction(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn unknown_action(msg: impl Into<String>) -> Self {
        Self::UnknownAction(msg.into())
    }
}
