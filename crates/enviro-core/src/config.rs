// ── Runtime agent configuration ──
//
// These types describe *what* the agent samples and *where* it publishes.
// They never touch disk: the binary loads the config file, resolves the
// device identity and hands an `AgentConfig` in.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use enviro_mqtt::TransportConfig;

use crate::convert::COMPENSATION_FACTOR;
use crate::model::Device;

/// Sysfs locations of the primary adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorPaths {
    /// IIO device directory of the BME280.
    pub weather: PathBuf,
    /// IIO device directory of the ADS1015 reading the gas sensor.
    pub gas: PathBuf,
    /// IIO device directory of the LTR559.
    pub light: PathBuf,
    /// Thermal zone file reporting the SoC temperature in m°C.
    pub cpu_thermal: PathBuf,
}

impl Default for SensorPaths {
    fn default() -> Self {
        Self {
            weather: "/sys/bus/iio/devices/iio:device0".into(),
            gas: "/sys/bus/iio/devices/iio:device1".into(),
            light: "/sys/bus/iio/devices/iio:device2".into(),
            cpu_thermal: "/sys/class/thermal/thermal_zone0/temp".into(),
        }
    }
}

/// Serial settings of the particulate sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticulatePort {
    /// TTY already configured for 9600 8N1.
    pub port: PathBuf,
    /// GPIO value file wired to the sensor's reset pin.
    pub reset_gpio: Option<PathBuf>,
    /// Per-read timeout.
    pub timeout: Duration,
}

impl Default for ParticulatePort {
    fn default() -> Self {
        Self {
            port: "/dev/serial0".into(),
            reset_gpio: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for one agent process.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Broker connection settings.
    pub transport: TransportConfig,
    /// Telemetry state topic.
    pub state_topic: String,
    /// Sleep between cycles.
    pub read_interval: Duration,
    /// Home Assistant discovery prefix.
    pub discovery_prefix: String,
    /// Identity announced with every discovery entity.
    pub device: Arc<Device>,
    /// Board serial, attached to every snapshot.
    pub serial: String,
    /// Whether a PMS5003 is fitted.
    pub has_pms: bool,
    pub sensors: SensorPaths,
    pub particulate: ParticulatePort,
    /// Divisor of the CPU self-heating correction.
    pub compensation_factor: f64,
}

impl AgentConfig {
    /// Broker label shown on the status display.
    pub fn broker(&self) -> &str {
        &self.transport.host
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            state_topic: "enviro".into(),
            read_interval: Duration::from_secs(5),
            discovery_prefix: crate::discovery::DISCOVERY_PREFIX.into(),
            device: Arc::new(Device::default()),
            serial: "0000000000".into(),
            has_pms: false,
            sensors: SensorPaths::default(),
            particulate: ParticulatePort::default(),
            compensation_factor: COMPENSATION_FACTOR,
        }
    }
}
