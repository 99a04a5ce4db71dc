use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatoError {
    /// Rejected before any mutation.
    #[error("{0}")]
    Validation(String),

    #[error("No team assigned.")]
    NoTeam,

    #[error("{0}")]
    Forbidden(String),

    /// Also returned for records owned by another team, so their existence does not leak.
    #[error("{0} not found.")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatoError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StatoError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        StatoError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        StatoError::Conflict(msg.into())
    }

    /// Errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        match self {
            StatoError::Validation(_)
            | StatoError::NoTeam
            | StatoError::Forbidden(_)
            | StatoError::NotFound(_)
            | StatoError::Conflict(_) => true,
            StatoError::Store(_) | StatoError::Io(_) | StatoError::Json(_) => false,
        }
    }
}

pub type Result<T, E = StatoError> = std::result::Result<T, E>;
