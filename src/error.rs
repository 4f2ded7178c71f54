use thiserror::Error;

/// Operator-facing classification of every engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape or policy violation; surfaced, never retried automatically.
    Validation,
    /// Group or target does not resolve; blocks further action.
    NotFound,
    /// Network/backend hiccup; surfaced with a retry affordance.
    Transient,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Transient(String),

    #[error("a commit is already in flight for this view")]
    CommitInFlight,
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::CommitInFlight => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Transient(_) => ErrorKind::Transient,
        }
    }

    /// Wire code used in sidecar error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::NotFound(_) => "not_found",
            Self::Transient(_) => "transient",
            Self::CommitInFlight => "commit_in_flight",
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Transient(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
