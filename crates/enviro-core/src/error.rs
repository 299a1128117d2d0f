// ── Core error types ──
//
// Faults raised while sampling, publishing or registering entities.
// Transport errors from enviro-mqtt are folded into `Transport`; sensor
// faults keep their kind so the sampling loop can match on timeouts.

use thiserror::Error;

use crate::sensors::SensorError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to broker at {broker}: {reason}")]
    ConnectionFailed { broker: String, reason: String },

    #[error("Broker transport error: {0}")]
    Transport(#[from] enviro_mqtt::Error),

    // ── Adapter errors ───────────────────────────────────────────────
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error("Display error: {message}")]
    Display { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for faults that abort startup rather than a cycle.
    pub fn is_startup_fault(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Config { .. })
    }
}
