use thiserror::Error;

/// All errors produced by deadair-core.
#[derive(Debug, Error)]
pub enum DeadAirError {
    #[error("audio source unavailable for {id}: {reason}")]
    SourceUnavailable { id: String, reason: String },

    #[error("cannot decode audio: {0}")]
    Decode(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeadAirError {
    pub fn source_unavailable(id: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether a batch orchestrator may retry the call later.
    ///
    /// Only fetch failures are transient; malformed audio and bad parameters
    /// fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, DeadAirError>;
