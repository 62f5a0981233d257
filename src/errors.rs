use thiserror::Error;

/// Typed error hierarchy for shunt.
///
/// Use at module boundaries (planning, dispatch, search routing, registry
/// rejections). Internal/leaf functions can continue using `anyhow::Result` —
/// the `Internal` variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum ShuntError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {tool}: {message}")]
    Validation { tool: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Provider error: {message}")]
    Provider { message: String, retryable: bool },

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<u64> },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Quota exhausted: {0}")]
    Quota(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Planning error: {0}")]
    Planning(String),

    #[error("Tool error: {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using ShuntError.
pub type ShuntResult<T> = std::result::Result<T, ShuntError>;

impl ShuntError {
    /// Whether this error is retryable (rate limits, transient provider errors).
    pub fn is_retryable(&self) -> bool {
        match self {
            ShuntError::RateLimit { .. } => true,
            ShuntError::Provider { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ShuntError::Config("bad value".into());
        assert_eq!(err.to_string(), "Configuration error: bad value");
    }

    #[test]
    fn provider_error_retryable() {
        let err = ShuntError::Provider {
            message: "timeout".into(),
            retryable: true,
        };
        assert_eq!(err.to_string(), "Provider error: timeout");
        assert!(err.is_retryable());
    }

    #[test]
    fn rate_limit_retryable() {
        let err = ShuntError::RateLimit {
            retry_after: Some(30),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn auth_error_not_retryable() {
        let err = ShuntError::Auth("invalid key".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn planning_error_display() {
        let err = ShuntError::Planning("empty batch".into());
        assert_eq!(err.to_string(), "Planning error: empty batch");
        assert!(!err.is_retryable());
    }

    #[test]
    fn internal_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("something broke");
        let err: ShuntError = anyhow_err.into();
        assert!(matches!(err, ShuntError::Internal(_)));
        assert!(!err.is_retryable());
    }
}
