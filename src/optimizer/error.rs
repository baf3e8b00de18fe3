//! Optimizer error types with retry classification.
//!
//! Distinguishes between transient transport errors (worth one more try) and
//! permanent errors (surfaced immediately). Conflict-level retries live in
//! the reconciliation engine, not here.

use std::time::Duration;

/// Error from an optimizer gateway call.
#[derive(Debug)]
pub struct OptimizerError {
    /// The kind of error
    pub kind: OptimizerErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
    /// Suggested retry delay (from Retry-After header or calculated)
    pub retry_after: Option<Duration>,
}

impl OptimizerError {
    /// Create a rate limit error.
    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: OptimizerErrorKind::RateLimited,
            status_code: Some(429),
            message,
            retry_after,
        }
    }

    /// Create a server error.
    pub fn server_error(status_code: u16, message: String) -> Self {
        Self {
            kind: OptimizerErrorKind::ServerError,
            status_code: Some(status_code),
            message,
            retry_after: None,
        }
    }

    /// Create a client error (bad request, auth, etc.).
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self {
            kind: OptimizerErrorKind::ClientError,
            status_code: Some(status_code),
            message,
            retry_after: None,
        }
    }

    /// Create a network error (connection failure or timeout).
    pub fn network_error(message: String) -> Self {
        Self {
            kind: OptimizerErrorKind::NetworkError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Create a parse error (unparseable or structurally invalid proposal).
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: OptimizerErrorKind::ParseError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Check if this error is transient and worth retrying at the transport level.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Get the suggested delay before retry.
    ///
    /// Returns the `retry_after` if set, otherwise a backoff based on error kind.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base_delay = match self.kind {
            OptimizerErrorKind::RateLimited => Duration::from_secs(5),
            OptimizerErrorKind::ServerError => Duration::from_secs(2),
            OptimizerErrorKind::NetworkError => Duration::from_secs(1),
            _ => Duration::from_secs(1),
        };

        // Exponential backoff: base * 2^attempt, capped at 60 seconds
        let multiplier = 2u64.saturating_pow(attempt);
        let delay_secs = base_delay.as_secs().saturating_mul(multiplier).min(60);

        Duration::from_secs(delay_secs)
    }
}

impl std::fmt::Display for OptimizerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for OptimizerError {}

/// Classification of optimizer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerErrorKind {
    /// Rate limited (429) - transient, retry with backoff
    RateLimited,
    /// Server error (500, 502, 503, 504) - transient
    ServerError,
    /// Client error (400, 401, 403, 404) - permanent
    ClientError,
    /// Network error (connection failed, timeout) - transient
    NetworkError,
    /// Proposal could not be parsed into the expected task-array shape - permanent
    ParseError,
}

impl OptimizerErrorKind {
    /// Check if this error kind is transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OptimizerErrorKind::RateLimited
                | OptimizerErrorKind::ServerError
                | OptimizerErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for OptimizerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizerErrorKind::RateLimited => write!(f, "Rate limited"),
            OptimizerErrorKind::ServerError => write!(f, "Server error"),
            OptimizerErrorKind::ClientError => write!(f, "Client error"),
            OptimizerErrorKind::NetworkError => write!(f, "Network error"),
            OptimizerErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Configuration for transport-level retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts per gateway call
    pub max_retries: u32,
    /// Whether to retry on rate limit errors
    pub retry_rate_limits: bool,
    /// Whether to retry on server errors
    pub retry_server_errors: bool,
    /// Whether to retry on network errors
    pub retry_network_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_rate_limits: true,
            retry_server_errors: true,
            retry_network_errors: true,
        }
    }
}

impl RetryConfig {
    /// Check if the given error should be retried based on this config.
    pub fn should_retry(&self, error: &OptimizerError) -> bool {
        match error.kind {
            OptimizerErrorKind::RateLimited => self.retry_rate_limits,
            OptimizerErrorKind::ServerError => self.retry_server_errors,
            OptimizerErrorKind::NetworkError => self.retry_network_errors,
            OptimizerErrorKind::ClientError | OptimizerErrorKind::ParseError => false,
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> OptimizerErrorKind {
    match status {
        429 => OptimizerErrorKind::RateLimited,
        500 | 502 | 503 | 504 => OptimizerErrorKind::ServerError,
        400..=499 => OptimizerErrorKind::ClientError,
        _ => OptimizerErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(OptimizerErrorKind::RateLimited.is_transient());
        assert!(OptimizerErrorKind::ServerError.is_transient());
        assert!(OptimizerErrorKind::NetworkError.is_transient());
        assert!(!OptimizerErrorKind::ClientError.is_transient());
        assert!(!OptimizerErrorKind::ParseError.is_transient());
    }

    #[test]
    fn http_status_classification() {
        assert_eq!(classify_http_status(429), OptimizerErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), OptimizerErrorKind::ServerError);
        assert_eq!(classify_http_status(503), OptimizerErrorKind::ServerError);
        assert_eq!(classify_http_status(400), OptimizerErrorKind::ClientError);
        assert_eq!(classify_http_status(401), OptimizerErrorKind::ClientError);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let error = OptimizerError::rate_limited("test".to_string(), None);

        let delay_0 = error.suggested_delay(0);
        let delay_1 = error.suggested_delay(1);
        assert!(delay_1 > delay_0);

        let delay_10 = error.suggested_delay(10);
        assert!(delay_10.as_secs() <= 60);
    }

    #[test]
    fn retry_after_is_respected() {
        let error =
            OptimizerError::rate_limited("test".to_string(), Some(Duration::from_secs(30)));
        assert_eq!(error.suggested_delay(0), Duration::from_secs(30));
        assert_eq!(error.suggested_delay(5), Duration::from_secs(30));
    }

    #[test]
    fn parse_errors_are_never_retried() {
        let config = RetryConfig::default();
        assert!(!config.should_retry(&OptimizerError::parse_error("bad".to_string())));
        assert!(config.should_retry(&OptimizerError::network_error("down".to_string())));
    }
}
