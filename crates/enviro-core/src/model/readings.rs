use serde::Serialize;

/// Temperature/pressure/humidity from the weather sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherSample {
    /// °C, uncompensated.
    pub temperature: f64,
    /// hPa.
    pub pressure: f64,
    /// %RH.
    pub humidity: f64,
}

/// Sensing-element resistances from the gas sensor, in Ω.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasSample {
    pub oxidising: f64,
    pub reducing: f64,
    pub nh3: f64,
}

/// Everything the primary adapters report in one cycle, before conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEnvironment {
    pub weather: WeatherSample,
    pub gas: GasSample,
    pub lux: f64,
    /// SoC temperature used for self-heating compensation, °C.
    pub cpu_temperature: f64,
}

/// Particulate concentrations in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParticulateReading {
    pub pm1: u16,
    pub pm25: u16,
    pub pm10: u16,
}

/// One cycle's snapshot, exactly as published on the state topic.
///
/// Built fresh every cycle, serialized once and dropped. Field order is
/// the wire order; particulate channels only appear when a reading was
/// taken this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorReadings {
    pub temperature: i64,
    pub pressure: i64,
    pub humidity: i64,
    pub oxidised: i64,
    pub reduced: i64,
    pub nh3: i64,
    pub lux: i64,
    #[serde(flatten)]
    pub particulates: Option<ParticulateReading>,
    pub serial: String,
}

impl SensorReadings {
    /// Channels present in every snapshot.
    pub const REQUIRED_CHANNELS: [&'static str; 7] = [
        "temperature",
        "pressure",
        "humidity",
        "oxidised",
        "reduced",
        "nh3",
        "lux",
    ];

    /// Channels present only with a particulate reading.
    pub const PARTICULATE_CHANNELS: [&'static str; 3] = ["pm1", "pm25", "pm10"];

    /// Attach this cycle's particulate values.
    pub fn with_particulates(mut self, reading: Option<ParticulateReading>) -> Self {
        self.particulates = reading;
        self
    }

    /// Canonical JSON body for the state topic.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> SensorReadings {
        SensorReadings {
            temperature: 17,
            pressure: 101_320,
            humidity: 45,
            oxidised: 20,
            reduced: 300,
            nh3: 80,
            lux: 120,
            particulates: None,
            serial: "1234567890".into(),
        }
    }

    #[test]
    fn json_has_required_channels_and_serial_only() {
        let value: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        let object = value.as_object().unwrap();

        for key in SensorReadings::REQUIRED_CHANNELS {
            assert!(object.get(key).unwrap().is_i64(), "{key} should be an integer");
        }
        for key in SensorReadings::PARTICULATE_CHANNELS {
            assert!(!object.contains_key(key), "{key} should be absent");
        }
        assert_eq!(object["serial"], "1234567890");
        assert_eq!(object.len(), 8);
    }

    #[test]
    fn particulates_are_flattened_before_serial() {
        let readings = sample().with_particulates(Some(ParticulateReading {
            pm1: 3,
            pm25: 5,
            pm10: 9,
        }));
        assert_eq!(
            readings.to_json().unwrap(),
            r#"{"temperature":17,"pressure":101320,"humidity":45,"oxidised":20,"reduced":300,"nh3":80,"lux":120,"pm1":3,"pm25":5,"pm10":9,"serial":"1234567890"}"#
        );
    }
}
