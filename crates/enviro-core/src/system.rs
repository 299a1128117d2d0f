// ── Host probes ──
//
// Board facts the agent needs besides the sensors: SoC temperature for
// compensation, the CPU serial used as device identity, and whether the
// network is up for the status display.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::sensors::iio::read_number;
use crate::sensors::{CpuTemperature, SensorError};

/// Serial reported when `/proc/cpuinfo` has none.
pub const UNKNOWN_SERIAL: &str = "0000000000";

/// SoC temperature from a thermal zone (`/sys/class/thermal/thermal_zone*/temp`).
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CpuTemperature for ThermalZone {
    fn celsius(&mut self) -> Result<f64, SensorError> {
        Ok(read_number("cpu", &self.path)? / 1000.0)
    }
}

/// Board serial from the `Serial` line of a cpuinfo file.
pub fn serial_number(cpuinfo: &Path) -> Option<String> {
    let text = std::fs::read_to_string(cpuinfo).ok()?;
    parse_serial(&text)
}

fn parse_serial(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("Serial"))
        .find_map(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_owned())
        .filter(|serial| !serial.is_empty())
}

/// Connectivity check for the status display.
pub trait NetworkProbe: Send {
    fn is_connected(&mut self) -> bool;
}

/// Connected when `hostname -I` lists at least one address.
#[derive(Debug, Default)]
pub struct HostnameProbe;

impl NetworkProbe for HostnameProbe {
    fn is_connected(&mut self) -> bool {
        match Command::new("hostname").arg("-I").output() {
            Ok(output) => output.status.success() && !output.stdout.trim_ascii().is_empty(),
            Err(e) => {
                debug!(error = %e, "hostname -I failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CPUINFO: &str = "processor\t: 0\nmodel name\t: ARMv7 Processor rev 4 (v7l)\n\nHardware\t: BCM2835\nRevision\t: a02082\nSerial\t\t: 00000000a1b2c3d4\nModel\t\t: Raspberry Pi 3 Model B Rev 1.2\n";

    #[test]
    fn parses_serial_line() {
        assert_eq!(parse_serial(CPUINFO).as_deref(), Some("00000000a1b2c3d4"));
    }

    #[test]
    fn no_serial_line_is_none() {
        assert_eq!(parse_serial("processor\t: 0\n"), None);
        assert_eq!(parse_serial("Serial\t\t: \n"), None);
    }

    #[test]
    fn serial_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpuinfo");
        std::fs::write(&path, CPUINFO).unwrap();
        assert_eq!(serial_number(&path).as_deref(), Some("00000000a1b2c3d4"));
        assert_eq!(serial_number(&dir.path().join("missing")), None);
    }

    #[test]
    fn thermal_zone_reads_millidegrees() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp");
        std::fs::write(&path, "48312\n").unwrap();
        let celsius = ThermalZone::new(&path).celsius().unwrap();
        assert!((celsius - 48.312).abs() < 1e-9);
    }
}
