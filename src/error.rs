//! Error types for the listener.

use thiserror::Error;

/// Errors raised by the listener and its connection capability.
///
/// Every variant except [`ListenError::Configuration`] is transient from the
/// listener's point of view: connect, subscribe, heartbeat and connection-loss
/// failures are logged and retried with backoff, never surfaced to the caller
/// of `run()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenError {
    #[error("Failed to establish listener connection: {0}")]
    Connect(String),
    #[error("Failed to subscribe to channel {channel}: {reason}")]
    Subscribe { channel: String, reason: String },
    #[error("Listener connection lost: {0}")]
    ConnectionLost(String),
    #[error("Liveness probe failed: {0}")]
    Heartbeat(String),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ListenError {
    /// Create a configuration error from any message
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        ListenError::Configuration(message.into())
    }
}

impl From<sqlx::Error> for ListenError {
    fn from(err: sqlx::Error) -> Self {
        ListenError::ConnectionLost(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ListenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ListenError::Subscribe {
            channel: "orders".to_string(),
            reason: "connection reset".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to subscribe to channel orders: connection reset"
        );

        let err = ListenError::configuration("notification timeout must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: notification timeout must be positive"
        );
    }
}
