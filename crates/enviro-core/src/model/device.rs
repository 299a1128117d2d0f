use serde::{Deserialize, Serialize};

/// Static identity of the board, embedded in every discovery payload.
///
/// Loaded once at startup and shared behind an `Arc` for the lifetime
/// of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable identifiers, first entry is used in topics and unique ids.
    pub identifiers: Vec<String>,
    pub name: String,
    pub sw_version: String,
    pub model: String,
    pub manufacturer: String,
}

impl Device {
    /// Primary identifier, or an empty string when none is configured.
    pub fn identifier(&self) -> &str {
        self.identifiers.first().map_or("", String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn identifier_is_first_entry() {
        let device = Device {
            identifiers: vec!["raspi-1234".into(), "aa:bb:cc".into()],
            ..Device::default()
        };
        assert_eq!(device.identifier(), "raspi-1234");
        assert_eq!(Device::default().identifier(), "");
    }

    #[test]
    fn serializes_discovery_device_block() {
        let device = Device {
            identifiers: vec!["raspi-1234".into()],
            name: "Enviro".into(),
            sw_version: "0.1.0".into(),
            model: "Enviro+".into(),
            manufacturer: "Pimoroni".into(),
        };
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "identifiers": ["raspi-1234"],
                "name": "Enviro",
                "sw_version": "0.1.0",
                "model": "Enviro+",
                "manufacturer": "Pimoroni",
            })
        );
    }
}
