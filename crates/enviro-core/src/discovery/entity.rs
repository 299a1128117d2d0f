// ── Discovery entities ──
//
// Sensor, Tracker and Binary share one capability set: a config topic and
// a JSON config payload. Trackers and binaries can also push state. The
// owning `Device` is shared, never copied per entity.

use std::fmt::Display;
use std::sync::Arc;

use enviro_mqtt::{Message, Publish};
use serde::Serialize;

use crate::error::CoreError;
use crate::model::Device;

/// Home Assistant component an entity is announced as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Sensor,
    DeviceTracker,
    BinarySensor,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::DeviceTracker => "device_tracker",
            Self::BinarySensor => "binary_sensor",
        }
    }
}

/// Lower-case a display name and replace spaces with underscores.
pub fn object_id(name: &str) -> String {
    name.replace(' ', "_").to_lowercase()
}

fn base_topic(prefix: &str, component: Component, device: &Device, object_id: &str) -> String {
    format!(
        "{prefix}/{}/{}/{object_id}",
        component.as_str(),
        device.identifier()
    )
}

// ── Sensor ───────────────────────────────────────────────────────

/// Inputs of a sensor registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSpec {
    pub friendly_name: String,
    pub unit: String,
    pub state_topic: String,
    pub device_class: Option<String>,
    /// Field of the JSON state body this sensor reads.
    pub value_template: Option<String>,
    pub icon: Option<String>,
}

impl SensorSpec {
    pub fn new(
        friendly_name: impl Into<String>,
        unit: impl Into<String>,
        state_topic: impl Into<String>,
    ) -> Self {
        Self {
            friendly_name: friendly_name.into(),
            unit: unit.into(),
            state_topic: state_topic.into(),
            device_class: None,
            value_template: None,
            icon: None,
        }
    }

    pub fn device_class(mut self, class: impl Into<String>) -> Self {
        self.device_class = Some(class.into());
        self
    }

    pub fn value_template(mut self, field: impl Into<String>) -> Self {
        self.value_template = Some(field.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// A numeric measurement channel.
#[derive(Debug, Clone)]
pub struct Sensor {
    device: Arc<Device>,
    spec: SensorSpec,
    name: String,
    object_id: String,
    unique_id: String,
    config_topic: String,
}

#[derive(Serialize)]
struct SensorConfig<'a> {
    device: &'a Device,
    name: &'a str,
    state_class: &'static str,
    state_topic: &'a str,
    unique_id: &'a str,
    unit_of_measurement: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_template: Option<String>,
}

impl Sensor {
    pub fn new(prefix: &str, device: &Arc<Device>, spec: SensorSpec) -> Result<Self, CoreError> {
        if spec.friendly_name.trim().is_empty() {
            return Err(CoreError::Config {
                message: "sensor friendly name must not be empty".into(),
            });
        }
        if spec.unit.trim().is_empty() {
            return Err(CoreError::Config {
                message: format!(
                    "sensor '{}' needs a unit of measurement",
                    spec.friendly_name
                ),
            });
        }

        let object_id = object_id(&spec.friendly_name);
        // Class-less sensors on one device share this id.
        let unique_id = format!(
            "{}_{}",
            device.identifier(),
            spec.device_class.as_deref().unwrap_or("None")
        );
        let config_topic = format!(
            "{}/config",
            base_topic(prefix, Component::Sensor, device, &object_id)
        );

        Ok(Self {
            name: format!("{} {}", device.name, spec.friendly_name),
            device: Arc::clone(device),
            spec,
            object_id,
            unique_id,
            config_topic,
        })
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn config_topic(&self) -> &str {
        &self.config_topic
    }

    pub fn config_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&SensorConfig {
            device: &self.device,
            name: &self.name,
            state_class: "measurement",
            state_topic: &self.spec.state_topic,
            unique_id: &self.unique_id,
            unit_of_measurement: &self.spec.unit,
            device_class: self.spec.device_class.as_deref(),
            icon: self.spec.icon.as_deref(),
            value_template: self
                .spec
                .value_template
                .as_deref()
                .map(|field| format!("{{{{ value_json.{field} }}}}")),
        })
    }
}

// ── Tracker ──────────────────────────────────────────────────────

/// Presence reported on a tracker's state topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Home,
    NotHome,
}

impl TrackerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::NotHome => "not_home",
        }
    }
}

/// GPS fix published as tracker attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub gps_accuracy: f64,
}

/// A device tracker; state and attributes live under its `~` base topic.
#[derive(Debug, Clone)]
pub struct Tracker {
    device: Arc<Device>,
    name: String,
    unique_id: String,
    base: String,
}

#[derive(Serialize)]
struct TrackerConfig<'a> {
    #[serde(rename = "~")]
    base: &'a str,
    name: &'a str,
    unique_id: &'a str,
    stat_t: &'static str,
    json_attr_t: &'static str,
    payload_home: &'static str,
    payload_not_home: &'static str,
    device: &'a Device,
}

impl Tracker {
    pub fn new(prefix: &str, device: &Arc<Device>, name: &str) -> Result<Self, CoreError> {
        let object_id = non_empty_object_id("tracker", name)?;
        Ok(Self {
            device: Arc::clone(device),
            name: name.to_owned(),
            unique_id: format!("{}_{object_id}", device.identifier()),
            base: base_topic(prefix, Component::DeviceTracker, device, &object_id),
        })
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn base_topic(&self) -> &str {
        &self.base
    }

    pub fn config_topic(&self) -> String {
        format!("{}/config", self.base)
    }

    pub fn config_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&TrackerConfig {
            base: &self.base,
            name: &self.name,
            unique_id: &self.unique_id,
            stat_t: "~/state",
            json_attr_t: "~/attributes",
            payload_home: TrackerState::Home.as_str(),
            payload_not_home: TrackerState::NotHome.as_str(),
            device: &self.device,
        })
    }

    /// Publish the GPS fix on `~/attributes`.
    pub async fn send<P: Publish>(
        &self,
        transport: &P,
        location: Location,
    ) -> Result<(), CoreError> {
        let body = serde_json::to_string(&location)?;
        transport
            .publish(Message::new(format!("{}/attributes", self.base), body))
            .await?;
        Ok(())
    }

    /// Publish home / not_home on `~/state`.
    pub async fn send_state<P: Publish>(
        &self,
        transport: &P,
        state: TrackerState,
    ) -> Result<(), CoreError> {
        transport
            .publish(Message::new(format!("{}/state", self.base), state.as_str()))
            .await?;
        Ok(())
    }
}

// ── Binary ───────────────────────────────────────────────────────

/// A two-state sensor with an opaque stringified payload.
#[derive(Debug, Clone)]
pub struct Binary {
    device: Arc<Device>,
    name: String,
    unique_id: String,
    icon: String,
    base: String,
}

#[derive(Serialize)]
struct BinaryConfig<'a> {
    #[serde(rename = "~")]
    base: &'a str,
    name: &'a str,
    unique_id: &'a str,
    stat_t: &'static str,
    icon: &'a str,
    device: &'a Device,
}

impl Binary {
    pub fn new(
        prefix: &str,
        device: &Arc<Device>,
        name: &str,
        icon: &str,
    ) -> Result<Self, CoreError> {
        let object_id = non_empty_object_id("binary sensor", name)?;
        Ok(Self {
            device: Arc::clone(device),
            name: name.to_owned(),
            unique_id: format!("{}_{object_id}", device.identifier()),
            icon: icon.to_owned(),
            base: base_topic(prefix, Component::BinarySensor, device, &object_id),
        })
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn base_topic(&self) -> &str {
        &self.base
    }

    pub fn config_topic(&self) -> String {
        format!("{}/config", self.base)
    }

    pub fn config_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&BinaryConfig {
            base: &self.base,
            name: &self.name,
            unique_id: &self.unique_id,
            stat_t: "~/state",
            icon: &self.icon,
            device: &self.device,
        })
    }

    /// Publish `value` as text on `~/state`.
    pub async fn send<P: Publish>(
        &self,
        transport: &P,
        value: impl Display,
    ) -> Result<(), CoreError> {
        transport
            .publish(Message::new(format!("{}/state", self.base), value.to_string()))
            .await?;
        Ok(())
    }
}

fn non_empty_object_id(kind: &str, name: &str) -> Result<String, CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Config {
            message: format!("{kind} name must not be empty"),
        });
    }
    Ok(object_id(name))
}

// ── Entity ───────────────────────────────────────────────────────

/// Any announceable entity.
#[derive(Debug, Clone)]
pub enum Entity {
    Sensor(Sensor),
    Tracker(Tracker),
    Binary(Binary),
}

impl Entity {
    pub fn component(&self) -> Component {
        match self {
            Self::Sensor(_) => Component::Sensor,
            Self::Tracker(_) => Component::DeviceTracker,
            Self::Binary(_) => Component::BinarySensor,
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Sensor(s) => s.unique_id(),
            Self::Tracker(t) => t.unique_id(),
            Self::Binary(b) => b.unique_id(),
        }
    }

    pub fn config_topic(&self) -> String {
        match self {
            Self::Sensor(s) => s.config_topic().to_owned(),
            Self::Tracker(t) => t.config_topic(),
            Self::Binary(b) => b.config_topic(),
        }
    }

    pub fn config_payload(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Sensor(s) => s.config_payload(),
            Self::Tracker(t) => t.config_payload(),
            Self::Binary(b) => b.config_payload(),
        }
    }

    /// Retained config message for this entity.
    pub fn config_message(&self) -> Result<Message, CoreError> {
        Ok(Message::new(self.config_topic(), self.config_payload()?).retained())
    }

    /// Publish the retained config and wait for the broker's acknowledgement.
    pub async fn publish_config<P: Publish>(&self, transport: &P) -> Result<(), CoreError> {
        transport.publish_acked(self.config_message()?).await?;
        Ok(())
    }
}

impl From<Sensor> for Entity {
    fn from(sensor: Sensor) -> Self {
        Self::Sensor(sensor)
    }
}

impl From<Tracker> for Entity {
    fn from(tracker: Tracker) -> Self {
        Self::Tracker(tracker)
    }
}

impl From<Binary> for Entity {
    fn from(binary: Binary) -> Self {
        Self::Binary(binary)
    }
}
