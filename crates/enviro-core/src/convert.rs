// ── Raw → published conversion ──
//
// Turns adapter values into the integers published on the state topic:
// self-heating compensation, truncation toward zero, pressure in Pa
// rounded to the nearest 10, gas resistance in kΩ.

use crate::model::{RawEnvironment, SensorReadings};

/// Empirical divisor of the CPU self-heating correction.
pub const COMPENSATION_FACTOR: f64 = 2.25;

/// Correct the board temperature for heat coming off the SoC.
pub fn compensate_temperature(raw: f64, cpu: f64, factor: f64) -> f64 {
    raw - (cpu - raw) / factor
}

/// Drop the fractional part (toward zero), never round.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn truncate(value: f64) -> i64 {
    value.trunc() as i64
}

/// hPa → Pa, truncated, then rounded to the nearest 10.
///
/// Ties go to the even multiple (101_325 → 101_320, 101_335 → 101_340).
pub fn pressure_pascals(hpa: f64) -> i64 {
    round_to_tens(truncate(hpa * 100.0))
}

fn round_to_tens(value: i64) -> i64 {
    let tens = value.div_euclid(10);
    let units = value.rem_euclid(10);
    let rounded = match units {
        0..=4 => tens,
        5 if tens % 2 == 0 => tens,
        _ => tens + 1,
    };
    rounded * 10
}

/// Ω → kΩ, truncated.
pub fn gas_kilohms(ohms: f64) -> i64 {
    truncate(ohms / 1000.0)
}

/// Build the published snapshot from one cycle's raw values.
///
/// Particulate channels are merged separately by the sampling loop.
pub fn readings_from_raw(raw: &RawEnvironment, factor: f64, serial: &str) -> SensorReadings {
    let temperature =
        compensate_temperature(raw.weather.temperature, raw.cpu_temperature, factor);

    SensorReadings {
        temperature: truncate(temperature),
        pressure: pressure_pascals(raw.weather.pressure),
        humidity: truncate(raw.weather.humidity),
        oxidised: gas_kilohms(raw.gas.oxidising),
        reduced: gas_kilohms(raw.gas.reducing),
        nh3: gas_kilohms(raw.gas.nh3),
        lux: truncate(raw.lux),
        particulates: None,
        serial: serial.to_owned(),
    }
}
