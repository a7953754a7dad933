use std::time::Duration;

/// Errors from the language-model collaborator.
/// Any of these means the reply is unavailable; callers fall back, they do not retry.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    NetworkError(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ServerError { .. } | Self::NetworkError(_)
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidResponse(_) => "invalid_response",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            400 | 404 | 422 => Self::InvalidRequest(body),
            429 => Self::RateLimited { retry_after },
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidResponse(format!("unexpected status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(GatewayError::RateLimited { retry_after: None }.is_retryable());
        assert!(GatewayError::ServerError { status: 500, body: "err".into() }.is_retryable());
        assert!(GatewayError::NetworkError("tcp".into()).is_retryable());
        assert!(!GatewayError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!GatewayError::Cancelled.is_retryable());
        assert!(!GatewayError::AuthenticationFailed("bad key".into()).is_retryable());
    }

    #[test]
    fn from_status_mapping() {
        assert!(matches!(
            GatewayError::from_status(401, "unauthorized".into(), None),
            GatewayError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            GatewayError::from_status(400, "bad".into(), None),
            GatewayError::InvalidRequest(_)
        ));
        assert!(matches!(
            GatewayError::from_status(429, String::new(), Some(Duration::from_secs(2))),
            GatewayError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(2)
        ));
        assert!(matches!(
            GatewayError::from_status(503, "down".into(), None),
            GatewayError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            GatewayError::from_status(302, "moved".into(), None),
            GatewayError::InvalidResponse(_)
        ));
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(GatewayError::Cancelled.error_kind(), "cancelled");
        assert_eq!(GatewayError::Timeout(Duration::from_secs(1)).error_kind(), "timeout");
        assert_eq!(
            GatewayError::InvalidResponse("no choices".into()).error_kind(),
            "invalid_response"
        );
    }
}
