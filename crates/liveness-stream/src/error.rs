use thiserror::Error;

pub type Result<T> = std::result::Result<T, LivenessError>;

#[derive(Debug, Error)]
pub enum LivenessError {
    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("video payload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The stream could not be opened or ended before completion.
    ///
    /// `raw` carries whatever diagnostic payload the remote service sent, if any.
    #[error("transport error: {reason}")]
    Transport { reason: String, raw: Option<String> },

    #[error("stream cancelled")]
    Cancelled,

    #[error("invalid analysis result: {reason}")]
    InvalidResult { reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl LivenessError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
            raw: None,
        }
    }

    pub fn transport_with_raw(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
            raw: Some(raw.into()),
        }
    }

    pub fn invalid_result(reason: impl Into<String>) -> Self {
        Self::InvalidResult {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Errors detected locally, before any remote call was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput { .. } | Self::PayloadTooLarge { .. }
        )
    }

    /// The remote service's diagnostic payload attached to a transport failure.
    pub fn raw_diagnostic(&self) -> Option<&str> {
        match self {
            Self::Transport { raw, .. } => raw.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(LivenessError::malformed("missing sessionId").is_validation());
        assert!(
            LivenessError::PayloadTooLarge {
                size: 11,
                limit: 10
            }
            .is_validation()
        );
        assert!(!LivenessError::transport("reset").is_validation());
        assert!(!LivenessError::invalid_result("NaN").is_validation());
        assert!(!LivenessError::Cancelled.is_validation());
    }

    #[test]
    fn test_raw_diagnostic() {
        let err = LivenessError::transport_with_raw("closed", r#"{"ValidationException":{}}"#);
        assert_eq!(err.raw_diagnostic(), Some(r#"{"ValidationException":{}}"#));
        assert!(LivenessError::transport("closed").raw_diagnostic().is_none());
        assert!(err.to_string().contains("closed"));
    }
}
