use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused, DNS failure, timeout.
    Network,
    /// Provider throttled the request.
    ApiLimit,
    /// Provider does not cover this symbol/date.
    MissingData,
    /// Anything else: malformed payloads, bad credentials, storage faults.
    Other,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 4] = [
        ErrorKind::Network,
        ErrorKind::ApiLimit,
        ErrorKind::MissingData,
        ErrorKind::Other,
    ];

    /// Transient kinds are worth retrying against the same provider.
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::ApiLimit)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::ApiLimit => write!(f, "api_limit"),
            ErrorKind::MissingData => write!(f, "missing_data"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "network" => Ok(ErrorKind::Network),
            "api_limit" => Ok(ErrorKind::ApiLimit),
            "missing_data" => Ok(ErrorKind::MissingData),
            "other" => Ok(ErrorKind::Other),
            _ => Err(format!("Unknown error kind: {s}")),
        }
    }
}
