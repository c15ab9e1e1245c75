use crate::domain::values::error_kind::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}

/// A single provider call failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn api_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ApiLimit, message)
    }

    pub fn missing_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingData, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    /// Map a reqwest failure onto the taxonomy.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            return Self::network(e.to_string());
        }
        if let Some(status) = e.status() {
            return Self::from_status(status, e.to_string());
        }
        if e.is_decode() || e.is_body() {
            return Self::other(format!("Malformed response: {e}"));
        }
        Self::network(e.to_string())
    }

    pub fn from_status(status: reqwest::StatusCode, message: impl Into<String>) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::api_limit(message)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Self::missing_data(message)
        } else if status.is_server_error() {
            Self::network(message)
        } else {
            Self::other(message)
        }
    }
}

/// Every attempt the retry policy was allowed to make failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{last} (after {attempts} attempt(s))")]
pub struct RetryError {
    pub attempts: u32,
    pub last: FetchError,
}

impl RetryError {
    pub fn kind(&self) -> ErrorKind {
        self.last.kind
    }
}
