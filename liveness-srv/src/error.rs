//! Application-wide error types.

use liveness_stream::LivenessError;
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Liveness(#[from] LivenessError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote service returned HTTP {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Remote diagnostic payload carried by this error, if any.
    pub fn raw_diagnostic(&self) -> Option<&str> {
        match self {
            Self::Liveness(e) => e.raw_diagnostic(),
            Self::RemoteStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_diagnostic_passthrough() {
        let err: Error = LivenessError::transport_with_raw("closed", "{\"x\":1}").into();
        assert_eq!(err.raw_diagnostic(), Some("{\"x\":1}"));

        let err = Error::RemoteStatus {
            status: 400,
            body: "SessionNotFoundException".to_string(),
        };
        assert_eq!(err.raw_diagnostic(), Some("SessionNotFoundException"));
        assert!(err.to_string().contains("400"));
    }
}
