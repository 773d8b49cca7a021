//! Error types for the sync engine's collaborators.

use thiserror::Error;

/// Errors a [`Transport`](crate::Transport) can report when opening a
/// connection.
///
/// These never reach the session's consumers: a failed open is handled like
/// an unexpected close and retried with backoff.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint URL could not be used.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The transport could not start a connection attempt.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by a [`HealthSource`](crate::HealthSource).
///
/// Health failures are logged and otherwise ignored; the last good health
/// snapshot stays in place.
#[derive(Debug, Error)]
#[error("Health fetch failed: {0}")]
pub struct HealthError(Box<dyn std::error::Error + Send + Sync>);

impl HealthError {
    /// Wrap any error as a health fetch failure.
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}
