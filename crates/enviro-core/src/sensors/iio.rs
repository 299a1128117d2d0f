// Linux IIO sysfs adapters.
//
// The kernel drivers for the BME280 (bmp280), ADS1015 (ti-ads1015) and
// LTR559 (ltr501) expose each channel as a text file holding one number.

use std::path::{Path, PathBuf};

use super::{GasSensor, LightSensor, SensorError, WeatherSensor};
use crate::model::{GasSample, WeatherSample};

/// ADC reference of the gas heater circuit, volts.
const GAS_SUPPLY_VOLTS: f64 = 3.3;
/// Load resistor of each gas channel, ohms.
const GAS_LOAD_OHMS: f64 = 56_000.0;

/// Read one numeric sysfs attribute.
pub(crate) fn read_number(sensor: &'static str, path: &Path) -> Result<f64, SensorError> {
    let text = std::fs::read_to_string(path).map_err(|e| SensorError::io(sensor, path, e))?;
    let trimmed = text.trim();
    trimmed
        .parse::<f64>()
        .map_err(|_| SensorError::InvalidValue {
            sensor,
            path: path.display().to_string(),
            value: trimmed.to_owned(),
        })
}

// ── BME280 ───────────────────────────────────────────────────────

pub struct IioWeather {
    dir: PathBuf,
}

impl IioWeather {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl WeatherSensor for IioWeather {
    fn read(&mut self) -> Result<WeatherSample, SensorError> {
        const SENSOR: &str = "bme280";
        // m°C, kPa, m%RH
        let temperature = read_number(SENSOR, &self.dir.join("in_temp_input"))? / 1000.0;
        let pressure = read_number(SENSOR, &self.dir.join("in_pressure_input"))? * 10.0;
        let humidity = read_number(SENSOR, &self.dir.join("in_humidityrelative_input"))? / 1000.0;

        Ok(WeatherSample {
            temperature,
            pressure,
            humidity,
        })
    }
}

// ── MICS6814 via ADS1015 ─────────────────────────────────────────

pub struct IioGas {
    dir: PathBuf,
}

impl IioGas {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn channel_volts(&self, channel: u8) -> Result<f64, SensorError> {
        const SENSOR: &str = "mics6814";
        let raw = read_number(SENSOR, &self.dir.join(format!("in_voltage{channel}_raw")))?;
        let scale = read_number(SENSOR, &self.dir.join(format!("in_voltage{channel}_scale")))?;
        Ok(raw * scale / 1000.0)
    }
}

/// Sensing-element resistance from the divider output voltage.
pub fn gas_resistance(volts: f64) -> f64 {
    if volts >= GAS_SUPPLY_VOLTS {
        return 0.0;
    }
    volts * GAS_LOAD_OHMS / (GAS_SUPPLY_VOLTS - volts)
}

impl GasSensor for IioGas {
    fn read(&mut self) -> Result<GasSample, SensorError> {
        Ok(GasSample {
            oxidising: gas_resistance(self.channel_volts(0)?),
            reducing: gas_resistance(self.channel_volts(1)?),
            nh3: gas_resistance(self.channel_volts(2)?),
        })
    }
}

// ── LTR559 ───────────────────────────────────────────────────────

pub struct IioLight {
    dir: PathBuf,
}

impl IioLight {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LightSensor for IioLight {
    fn lux(&mut self) -> Result<f64, SensorError> {
        read_number("ltr559", &self.dir.join("in_illuminance_input"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, value: &str) {
        std::fs::write(dir.join(name), value).unwrap();
    }

    #[test]
    fn weather_scales_kernel_units() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "in_temp_input", "22150\n");
        write(dir.path(), "in_pressure_input", "101.325\n");
        write(dir.path(), "in_humidityrelative_input", "45900\n");

        let sample = IioWeather::new(dir.path()).read().unwrap();
        assert!((sample.temperature - 22.15).abs() < 1e-9);
        assert!((sample.pressure - 1013.25).abs() < 1e-9);
        assert!((sample.humidity - 45.9).abs() < 1e-9);
    }

    #[test]
    fn gas_converts_voltage_to_resistance() {
        let dir = tempfile::tempdir().unwrap();
        for (channel, raw) in [(0, "550"), (1, "1100"), (2, "0")] {
            write(dir.path(), &format!("in_voltage{channel}_raw"), raw);
            write(dir.path(), &format!("in_voltage{channel}_scale"), "2");
        }

        let sample = IioGas::new(dir.path()).read().unwrap();
        // 1.1 V -> 1.1 * 56000 / 2.2
        assert!((sample.oxidising - 28_000.0).abs() < 1e-6);
        // 2.2 V -> 2.2 * 56000 / 1.1
        assert!((sample.reducing - 112_000.0).abs() < 1e-6);
        assert!(sample.nh3.abs() < 1e-9);
    }

    #[test]
    fn saturated_gas_channel_reads_zero() {
        assert!(gas_resistance(3.3).abs() < f64::EPSILON);
        assert!(gas_resistance(4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_attribute_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = IioLight::new(dir.path()).lux().unwrap_err();
        assert!(matches!(err, SensorError::Io { sensor: "ltr559", .. }));
    }

    #[test]
    fn garbage_attribute_is_invalid_value() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "in_illuminance_input", "n/a");
        let err = IioLight::new(dir.path()).lux().unwrap_err();
        assert!(matches!(err, SensorError::InvalidValue { .. }));
    }
}
