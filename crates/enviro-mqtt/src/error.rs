use thiserror::Error;

/// Top-level error type for the `enviro-mqtt` crate.
///
/// Covers connection setup, request submission and delivery
/// acknowledgement. `enviro-core` folds these into its own transport
/// variant.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// Network or protocol failure while talking to the broker.
    #[error("Broker connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    /// Broker answered CONNECT with a non-success return code.
    #[error("Broker refused connection: {code}")]
    Refused { code: String },

    /// No CONNACK within the connect timeout.
    #[error("Broker did not answer within {timeout_secs}s")]
    ConnectTimeout { timeout_secs: u64 },

    /// TLS configuration could not be built (unreadable CA file, etc.)
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Requests ────────────────────────────────────────────────────
    /// The client request queue rejected the publish.
    #[error("Publish request rejected: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// QoS 1 publish was not acknowledged in time.
    #[error("No delivery acknowledgement for '{topic}' within {timeout_secs}s")]
    AckTimeout { topic: String, timeout_secs: u64 },

    /// The background event loop has stopped.
    #[error("Broker session closed")]
    SessionClosed,
}

impl Error {
    /// Returns `true` if retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::ConnectTimeout { .. } | Self::AckTimeout { .. }
        )
    }
}
