// ── Sensor adapters ──
//
// One synchronous trait per physical sensor. Drivers own their own
// timeouts; callers only see a value or a `SensorError` whose kind says
// whether the fault is worth the sampling loop's single retry.

pub mod iio;
pub mod pms5003;

use std::path::Path;

use thiserror::Error;

use crate::model::{GasSample, ParticulateReading, RawEnvironment, WeatherSample};

/// Fault raised by a sensor adapter.
#[derive(Debug, Error)]
pub enum SensorError {
    /// Bytes arrived but no valid frame was assembled before the deadline.
    #[error("{sensor}: timed out waiting for a valid frame")]
    ReadTimeout { sensor: &'static str },

    /// The serial line stayed silent for the whole timeout.
    #[error("{sensor}: no data on the serial port within {timeout_ms}ms")]
    SerialTimeout { sensor: &'static str, timeout_ms: u64 },

    #[error("{sensor}: malformed frame: {reason}")]
    Frame { sensor: &'static str, reason: String },

    #[error("{sensor}: cannot access {path}: {source}")]
    Io {
        sensor: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{sensor}: unexpected value '{value}' in {path}")]
    InvalidValue {
        sensor: &'static str,
        path: String,
        value: String,
    },
}

impl SensorError {
    pub(crate) fn io(sensor: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            sensor,
            path: path.display().to_string(),
            source,
        }
    }

    pub fn is_read_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout { .. })
    }

    pub fn is_serial_timeout(&self) -> bool {
        matches!(self, Self::SerialTimeout { .. })
    }
}

/// Temperature, pressure and humidity (BME280).
pub trait WeatherSensor: Send {
    fn read(&mut self) -> Result<WeatherSample, SensorError>;
}

/// Oxidising, reducing and NH3 resistances (MICS6814 behind an ADC).
pub trait GasSensor: Send {
    fn read(&mut self) -> Result<GasSample, SensorError>;
}

/// Ambient light (LTR559).
pub trait LightSensor: Send {
    fn lux(&mut self) -> Result<f64, SensorError>;
}

/// Particulate matter (PMS5003).
pub trait ParticulateSensor: Send {
    fn read(&mut self) -> Result<ParticulateReading, SensorError>;

    /// Hardware reset, discarding anything buffered.
    fn reset(&mut self) -> Result<(), SensorError>;
}

/// SoC temperature, the input of self-heating compensation.
pub trait CpuTemperature: Send {
    fn celsius(&mut self) -> Result<f64, SensorError>;
}

/// Every adapter the sampling loop reads, owned by the process entry point.
pub struct SensorSuite {
    pub weather: Box<dyn WeatherSensor>,
    pub gas: Box<dyn GasSensor>,
    pub light: Box<dyn LightSensor>,
    pub cpu: Box<dyn CpuTemperature>,
    /// `None` when not fitted or disabled by the startup probe.
    pub particulate: Option<Box<dyn ParticulateSensor>>,
}

impl SensorSuite {
    /// Read the primary environmental adapters in one pass.
    pub fn read_primary(&mut self) -> Result<RawEnvironment, SensorError> {
        let cpu_temperature = self.cpu.celsius()?;
        let weather = self.weather.read()?;
        let gas = self.gas.read()?;
        let lux = self.light.lux()?;

        Ok(RawEnvironment {
            weather,
            gas,
            lux,
            cpu_temperature,
        })
    }

    pub fn has_particulate(&self) -> bool {
        self.particulate.is_some()
    }
}
