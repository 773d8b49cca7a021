//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur when talking to the analysis backend.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed or returned a non-success status.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The configured endpoint is not usable.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

#[cfg(feature = "ws")]
impl From<tokio_tungstenite::tungstenite::Error> for AdapterError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::Url(url) => AdapterError::InvalidEndpoint(url.to_string()),
            WsError::Io(io) => AdapterError::Connection(io.to_string()),
            WsError::Http(response) => {
                AdapterError::Http(format!("handshake rejected with status {}", response.status()))
            }
            other => AdapterError::Connection(other.to_string()),
        }
    }
}

impl From<AdapterError> for enigma_sync::HealthError {
    fn from(err: AdapterError) -> Self {
        enigma_sync::HealthError::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(AdapterError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            AdapterError::Http("API returned status 503".to_string()).to_string(),
            "HTTP request failed: API returned status 503"
        );
    }

    #[test]
    fn converts_into_health_error() {
        let err: enigma_sync::HealthError = AdapterError::Connection("refused".to_string()).into();
        assert!(err.to_string().contains("refused"));
    }
}
