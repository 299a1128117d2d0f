// ── Domain model ──
//
// Device identity shared by every discovery entity, and the per-cycle
// readings snapshot.

pub mod device;
pub mod readings;

pub use device::Device;
pub use readings::{
    GasSample, ParticulateReading, RawEnvironment, SensorReadings, WeatherSample,
};
