//! Error types for the licence client.
//!
//! Server-side rejections (codes 100-107) are not errors here: they travel as
//! data through [`crate::CheckOutcome`] and the stored [`crate::LicenceRecord`].

use thiserror::Error;

/// Licence client errors.
#[derive(Debug, Error)]
pub enum LicenceError {
    /// The product init was never registered.
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// The licensing server could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// Reading or writing the option store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The activation panel could not be rendered.
    #[error("render error: {0}")]
    Render(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenceError {
    /// Returns true if the remote server was unreachable.
    pub fn is_transport(&self) -> bool {
        matches!(self, LicenceError::Transport(_))
    }
}

/// Result type for licence operations.
pub type LicenceResult<T> = Result<T, LicenceError>;
