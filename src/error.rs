//! Sayboard Error Types
//!
//! One error type for the library surface. Backend internals use `anyhow`
//! and are folded into `Other` at the source boundary.

use thiserror::Error;

/// Central error type for Sayboard
#[derive(Error, Debug)]
pub enum SayboardError {
    #[error("Microphone unavailable: {0}")]
    MicrophoneBusy(String),

    #[error("Recognizer '{0}' is not ready")]
    NotReady(String),

    #[error("Failed to load recognizer '{name}': {reason}")]
    Load { name: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization executor has shut down")]
    ExecutorClosed,

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Sayboard operations
pub type SayResult<T> = Result<T, SayboardError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for SayboardError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        SayboardError::Lock(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_message() {
        let err = SayboardError::NotReady("en-us".to_string());
        assert_eq!(err.to_string(), "Recognizer 'en-us' is not ready");
    }

    #[test]
    fn test_anyhow_is_transparent() {
        let err: SayboardError = anyhow::anyhow!("model missing").into();
        assert_eq!(err.to_string(), "model missing");
    }
}
