//! Configuration for the enviro agent.
//!
//! TOML file + `ENVIRO_` environment overrides, the optional device
//! identity YAML document, and translation to `enviro_core::AgentConfig`.
//! The binary is the only consumer; core never reads files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use enviro_core::config::{AgentConfig, ParticulatePort, SensorPaths};
use enviro_core::convert::COMPENSATION_FACTOR;
use enviro_core::discovery::DISCOVERY_PREFIX;
use enviro_core::system::{UNKNOWN_SERIAL, serial_number};
use enviro_core::Device;
use enviro_mqtt::{Credentials, TlsMode, TransportConfig};

/// File name looked up in the working directory and the platform config dir.
pub const CONFIG_FILE: &str = "config.toml";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("invalid device identity document {path}: {source}")]
    Identity {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub mqtt: Mqtt,

    #[serde(default)]
    pub device: DeviceSection,

    #[serde(default)]
    pub sensors: Sensors,

    #[serde(default)]
    pub pms: Pms,
}

/// Broker connection and publishing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Mqtt {
    /// Broker host name or address.
    pub broker_ip: String,

    #[serde(default = "default_broker_port")]
    pub broker_port: u16,

    /// State topic for the readings snapshot.
    pub topic: String,

    /// Seconds between cycles.
    #[serde(default = "default_read_interval")]
    pub read_interval: u64,

    #[serde(default)]
    pub tls_mode: bool,

    pub username: Option<String>,

    /// Plaintext; only sent together with `username`.
    pub password: Option<String>,

    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,

    /// Seconds to wait for a discovery publish acknowledgement.
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout: u64,

    /// CA certificate trusted instead of the native roots.
    pub ca_cert: Option<PathBuf>,
}

fn default_broker_port() -> u16 {
    1883
}
fn default_read_interval() -> u64 {
    5
}
fn default_discovery_prefix() -> String {
    DISCOVERY_PREFIX.into()
}
fn default_ack_timeout() -> u64 {
    10
}

/// Device identity fallback and hardware flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceSection {
    #[serde(default = "default_device_name")]
    pub name: String,

    #[serde(default = "default_sw_version")]
    pub sw_version: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,

    /// A PMS5003 is wired to the serial port.
    #[serde(default)]
    pub has_pms: bool,

    /// YAML identity document, relative to the config file.
    pub identity: Option<PathBuf>,

    /// Overrides the serial read from `/proc/cpuinfo`.
    pub serial: Option<String>,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            sw_version: default_sw_version(),
            model: default_model(),
            manufacturer: default_manufacturer(),
            has_pms: false,
            identity: None,
            serial: None,
        }
    }
}

fn default_device_name() -> String {
    "Enviro".into()
}
fn default_sw_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}
fn default_model() -> String {
    "Enviro+".into()
}
fn default_manufacturer() -> String {
    "Pimoroni".into()
}

/// Sysfs paths of the primary adapters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Sensors {
    pub weather: PathBuf,
    pub gas: PathBuf,
    pub light: PathBuf,
    pub cpu_thermal: PathBuf,
    pub compensation_factor: f64,
}

impl Default for Sensors {
    fn default() -> Self {
        let paths = SensorPaths::default();
        Self {
            weather: paths.weather,
            gas: paths.gas,
            light: paths.light,
            cpu_thermal: paths.cpu_thermal,
            compensation_factor: COMPENSATION_FACTOR,
        }
    }
}

/// Particulate sensor serial settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Pms {
    pub port: PathBuf,
    pub reset_gpio: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for Pms {
    fn default() -> Self {
        let port = ParticulatePort::default();
        Self {
            port: port.port,
            reset_gpio: port.reset_gpio,
            timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_ip.trim().is_empty() {
            return Err(invalid("mqtt.broker_ip", "must not be empty"));
        }
        if self.mqtt.topic.trim().is_empty() {
            return Err(invalid("mqtt.topic", "must not be empty"));
        }
        if self.mqtt.read_interval == 0 {
            return Err(invalid("mqtt.read_interval", "must be at least 1 second"));
        }
        if self.mqtt.ack_timeout == 0 {
            return Err(invalid("mqtt.ack_timeout", "must be at least 1 second"));
        }
        if self.mqtt.password.is_some() && self.mqtt.username.is_none() {
            return Err(invalid("mqtt.password", "set without mqtt.username"));
        }
        if self.mqtt.ca_cert.is_some() && !self.mqtt.tls_mode {
            return Err(invalid("mqtt.ca_cert", "requires tls_mode = true"));
        }
        let factor = self.sensors.compensation_factor;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(invalid(
                "sensors.compensation_factor",
                format!("must be a positive number, got {factor}"),
            ));
        }
        if self.pms.timeout_ms == 0 {
            return Err(invalid("pms.timeout_ms", "must be greater than 0"));
        }
        Ok(())
    }

    /// Copy with the broker password masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.mqtt.password.is_some() {
            copy.mqtt.password = Some("********".into());
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Platform config file path (XDG on Linux).
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "enviro", "enviro").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push(CONFIG_FILE);
            p
        },
        |dirs| dirs.config_dir().join(CONFIG_FILE),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("enviro");
    p
}

/// Pick the config file: explicit path, else `./config.toml` when it
/// exists, else the platform path.
pub fn locate_config(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return local;
    }
    config_path()
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered sources: the TOML file, then `ENVIRO_<SECTION>__<KEY>`.
pub fn sources(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("ENVIRO_").split("__"))
}

/// Load and validate the config at `path`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.display().to_string(),
        });
    }
    extract(&sources(path))
}

/// Extract and validate a config from any figment.
pub fn extract(figment: &Figment) -> Result<Config, ConfigError> {
    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Device identity ─────────────────────────────────────────────────

/// Load the device identity YAML document.
pub fn load_identity(path: &Path) -> Result<Device, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound {
            path: path.display().to_string(),
        },
        _ => ConfigError::Io(e),
    })?;
    let device: Device = serde_yaml::from_str(&text).map_err(|source| ConfigError::Identity {
        path: path.display().to_string(),
        source,
    })?;
    if device.identifiers.iter().all(|id| id.trim().is_empty()) {
        return Err(invalid("identifiers", "identity document lists no identifiers"));
    }
    Ok(device)
}

/// Board serial: config override, then cpuinfo, then the all-zero fallback.
pub fn resolve_serial(config: &Config, cpuinfo: &Path) -> String {
    if let Some(ref serial) = config.device.serial {
        return serial.clone();
    }
    serial_number(cpuinfo).unwrap_or_else(|| {
        warn!(path = %cpuinfo.display(), "no board serial found, using {UNKNOWN_SERIAL}");
        UNKNOWN_SERIAL.into()
    })
}

/// MQTT client id and default device identifier.
pub fn client_id(serial: &str) -> String {
    format!("raspi-{serial}")
}

fn device(config: &Config, serial: &str, base_dir: &Path) -> Result<Device, ConfigError> {
    if let Some(ref identity) = config.device.identity {
        return load_identity(&base_dir.join(identity));
    }
    let section = &config.device;
    Ok(Device {
        identifiers: vec![client_id(serial)],
        name: section.name.clone(),
        sw_version: section.sw_version.clone(),
        model: section.model.clone(),
        manufacturer: section.manufacturer.clone(),
    })
}

fn tls_mode(mqtt: &Mqtt) -> TlsMode {
    match (mqtt.tls_mode, &mqtt.ca_cert) {
        (false, _) => TlsMode::Disabled,
        (true, Some(ca)) => TlsMode::CustomCa(ca.clone()),
        (true, None) => TlsMode::NativeRoots,
    }
}

/// Build the runtime `AgentConfig`.
///
/// `base_dir` anchors a relative identity document path, normally the
/// directory holding the config file.
pub fn resolve(config: &Config, serial: &str, base_dir: &Path) -> Result<AgentConfig, ConfigError> {
    let mqtt = &config.mqtt;

    let credentials = mqtt.username.as_ref().map(|username| Credentials {
        username: username.clone(),
        password: SecretString::from(mqtt.password.clone().unwrap_or_default()),
    });

    let transport = TransportConfig {
        client_id: client_id(serial),
        host: mqtt.broker_ip.clone(),
        port: mqtt.broker_port,
        tls: tls_mode(mqtt),
        credentials,
        ack_timeout: Duration::from_secs(mqtt.ack_timeout),
        ..TransportConfig::default()
    };

    Ok(AgentConfig {
        transport,
        state_topic: mqtt.topic.clone(),
        read_interval: Duration::from_secs(mqtt.read_interval),
        discovery_prefix: mqtt.discovery_prefix.clone(),
        device: Arc::new(device(config, serial, base_dir)?),
        serial: serial.to_owned(),
        has_pms: config.device.has_pms,
        sensors: SensorPaths {
            weather: config.sensors.weather.clone(),
            gas: config.sensors.gas.clone(),
            light: config.sensors.light.clone(),
            cpu_thermal: config.sensors.cpu_thermal.clone(),
        },
        particulate: ParticulatePort {
            port: config.pms.port.clone(),
            reset_gpio: config.pms.reset_gpio.clone(),
            timeout: Duration::from_millis(config.pms.timeout_ms),
        },
        compensation_factor: config.sensors.compensation_factor,
    })
}
