//! Error types for the evaluation client

use proof_core::CoreError;
use thiserror::Error;

/// Unified error type for the evaluation client.
///
/// Cancellation is its own class and is never mistaken for a tier failure:
/// it propagates to the top unchanged and never triggers fallback.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Evaluation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// A 4xx answer while a criteria set was attached: the tier itself may
    /// be healthy, so it is retried once without the criteria set.
    pub fn is_criteria_rejection(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if (400..500).contains(status))
    }
}
