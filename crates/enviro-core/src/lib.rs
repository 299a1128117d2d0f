//! Telemetry core for the enviro agent.
//!
//! Everything between the sensor drivers and the broker session:
//!
//! - **[`SamplingLoop`]** — reads all adapters, converts raw values into a
//!   [`SensorReadings`] snapshot, publishes it, refreshes the status display
//!   and sleeps. A failing cycle is logged and the loop carries on.
//!
//! - **[`DiscoveryRegistry`]** — announces every channel to Home Assistant
//!   with retained, acknowledged config payloads on
//!   `{prefix}/{component}/{device}/{object_id}/config`.
//!
//! - **[`TelemetryPublisher`]** — serializes one snapshot to the state topic,
//!   fire-and-forget.
//!
//! - **Adapters** ([`sensors`], [`system`]) — synchronous read traits plus
//!   Linux implementations over IIO sysfs, a thermal zone and a PMS5003
//!   serial port.
//!
//! Core never reads configuration files; the binary builds an
//! [`AgentConfig`] and hands it in.

pub mod config;
pub mod convert;
pub mod discovery;
pub mod display;
pub mod error;
pub mod model;
pub mod publisher;
pub mod sampler;
pub mod sensors;
pub mod system;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AgentConfig, ParticulatePort, SensorPaths};
pub use discovery::{Binary, DiscoveryRegistry, Entity, Registration, Sensor, Tracker};
pub use display::{StatusDisplay, StatusScreen};
pub use error::CoreError;
pub use model::{Device, ParticulateReading, RawEnvironment, SensorReadings};
pub use publisher::TelemetryPublisher;
pub use sampler::SamplingLoop;
pub use sensors::{SensorError, SensorSuite};
