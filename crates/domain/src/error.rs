//! Shared error type threaded through the turn-execution core.

use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation: {0}")]
    Validation(String),

    #[error("provider rate limited")]
    ProviderRateLimit { retry_after: Option<Duration> },

    #[error("provider timed out")]
    ProviderTimeout,

    #[error("provider error (status {status}): {body}")]
    ProviderError { status: u16, body: String },

    #[error("tool execution failed: {error} (denied={denied}, timeout={timeout})")]
    ToolExecution {
        error: String,
        denied: bool,
        timeout: bool,
    },

    #[error("aborted")]
    Abort,

    #[error("{0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map an HTTP status code to the matching domain error variant, per the
    /// 429/408/other taxonomy: rate limit, timeout, and everything else.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            429 => Error::ProviderRateLimit { retry_after: None },
            408 => Error::ProviderTimeout,
            _ => Error::ProviderError {
                status,
                body: body.into(),
            },
        }
    }

    /// Whether this error should surface as a `llm:error` event with a
    /// `RATE_LIMIT_EXCEEDED` code, per the turn-executor failure taxonomy.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::ProviderRateLimit { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ProviderTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_429_is_rate_limit() {
        let e = Error::from_status(429, "slow down");
        assert!(e.is_rate_limit());
    }

    #[test]
    fn from_status_408_is_timeout() {
        let e = Error::from_status(408, "");
        assert!(e.is_timeout());
    }

    #[test]
    fn from_status_other_is_provider_error() {
        let e = Error::from_status(500, "boom");
        match e {
            Error::ProviderError { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected ProviderError, got {other:?}"),
        }
    }
}
