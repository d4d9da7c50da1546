//! Error taxonomy for patient and session operations.

/// Failure of a store-backed operation.
///
/// Every variant except `Store` is a client error and guarantees the
/// operation made no change.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Referenced patient or session does not exist
    NotFound(String),
    /// Operation violates the session lifecycle
    InvalidState(String),
    /// Malformed input, rejected before touching the store
    Validation(String),
    /// Backing store failure
    Store(String),
}

impl SessionError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotFound(_) => "NOT_FOUND",
            SessionError::InvalidState(_) => "INVALID_STATE",
            SessionError::Validation(_) => "VALIDATION_ERROR",
            SessionError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, SessionError::Store(_))
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotFound(msg) => write!(f, "{msg}"),
            SessionError::InvalidState(msg) => write!(f, "{msg}"),
            SessionError::Validation(msg) => write!(f, "Invalid input: {msg}"),
            SessionError::Store(msg) => write!(f, "Store error: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<rusqlite::Error> for SessionError {
    fn from(error: rusqlite::Error) -> Self {
        SessionError::Store(error.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(error: serde_json::Error) -> Self {
        SessionError::Store(format!("frame encoding: {error}"))
    }
}
