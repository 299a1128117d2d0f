// ── Home Assistant discovery ──
//
// Announces entities once per session on
// `{prefix}/{component}/{device_id}/{object_id}/config`. Config messages
// are retained and acknowledged; a failed announcement is logged and
// handed back to the caller, the entity is still usable.

pub mod entity;

use std::sync::Arc;

use enviro_mqtt::Publish;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::model::{Device, SensorReadings};

pub use entity::{
    Binary, Component, Entity, Location, Sensor, SensorSpec, Tracker, TrackerState, object_id,
};

pub const DISCOVERY_PREFIX: &str = "homeassistant";

/// An entity together with the outcome of its config publish.
#[derive(Debug)]
pub struct Registration<E> {
    pub entity: E,
    pub delivery: Result<(), CoreError>,
}

impl<E> Registration<E> {
    pub fn is_delivered(&self) -> bool {
        self.delivery.is_ok()
    }

    pub fn into_entity(self) -> E {
        self.entity
    }
}

/// One published channel of the readings snapshot.
struct Channel {
    field: &'static str,
    friendly_name: &'static str,
    unit: &'static str,
    device_class: Option<&'static str>,
    icon: Option<&'static str>,
}

const fn channel(
    field: &'static str,
    friendly_name: &'static str,
    unit: &'static str,
    device_class: Option<&'static str>,
    icon: Option<&'static str>,
) -> Channel {
    Channel {
        field,
        friendly_name,
        unit,
        device_class,
        icon,
    }
}

const GAS_ICON: Option<&str> = Some("mdi:molecule");

const REQUIRED: [Channel; 7] = [
    channel("temperature", "Temperature", "°C", Some("temperature"), None),
    channel("pressure", "Pressure", "Pa", Some("pressure"), None),
    channel("humidity", "Humidity", "%", Some("humidity"), None),
    channel("oxidised", "Oxidised", "kΩ", None, GAS_ICON),
    channel("reduced", "Reduced", "kΩ", None, GAS_ICON),
    channel("nh3", "NH3", "kΩ", None, GAS_ICON),
    channel("lux", "Lux", "lx", Some("illuminance"), None),
];

const PARTICULATE: [Channel; 3] = [
    channel("pm1", "PM1", "µg/m³", Some("pm1"), None),
    channel("pm25", "PM25", "µg/m³", Some("pm25"), None),
    channel("pm10", "PM10", "µg/m³", Some("pm10"), None),
];

/// Builds entities and publishes their discovery configs.
pub struct DiscoveryRegistry<'a, P> {
    transport: &'a P,
    prefix: String,
}

impl<'a, P: Publish> DiscoveryRegistry<'a, P> {
    pub fn new(transport: &'a P, prefix: impl Into<String>) -> Self {
        Self {
            transport,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Announce a sensor. Errors only on invalid input; publish failures
    /// land in [`Registration::delivery`].
    pub async fn register_sensor(
        &self,
        device: &Arc<Device>,
        spec: SensorSpec,
    ) -> Result<Registration<Sensor>, CoreError> {
        let sensor = Sensor::new(&self.prefix, device, spec)?;
        let delivery = self.announce(&Entity::Sensor(sensor.clone())).await;
        Ok(Registration {
            entity: sensor,
            delivery,
        })
    }

    pub async fn register_tracker(
        &self,
        device: &Arc<Device>,
        name: &str,
    ) -> Result<Registration<Tracker>, CoreError> {
        let tracker = Tracker::new(&self.prefix, device, name)?;
        let delivery = self.announce(&Entity::Tracker(tracker.clone())).await;
        Ok(Registration {
            entity: tracker,
            delivery,
        })
    }

    pub async fn register_binary(
        &self,
        device: &Arc<Device>,
        name: &str,
        icon: &str,
    ) -> Result<Registration<Binary>, CoreError> {
        let binary = Binary::new(&self.prefix, device, name, icon)?;
        let delivery = self.announce(&Entity::Binary(binary.clone())).await;
        Ok(Registration {
            entity: binary,
            delivery,
        })
    }

    /// Register every channel of the readings snapshot against one state
    /// topic, particulate channels only when that sensor is active.
    pub async fn register_channels(
        &self,
        device: &Arc<Device>,
        state_topic: &str,
        with_particulates: bool,
    ) -> Result<Vec<Registration<Sensor>>, CoreError> {
        let particulate: &[Channel] = if with_particulates { &PARTICULATE } else { &[] };
        let mut registrations = Vec::with_capacity(REQUIRED.len() + particulate.len());

        for ch in REQUIRED.iter().chain(particulate) {
            let mut spec = SensorSpec::new(ch.friendly_name, ch.unit, state_topic)
                .value_template(ch.field);
            if let Some(class) = ch.device_class {
                spec = spec.device_class(class);
            }
            if let Some(icon) = ch.icon {
                spec = spec.icon(icon);
            }
            registrations.push(self.register_sensor(device, spec).await?);
        }

        let delivered = registrations.iter().filter(|r| r.is_delivered()).count();
        info!(
            delivered,
            total = registrations.len(),
            "discovery registration complete"
        );
        Ok(registrations)
    }

    async fn announce(&self, entity: &Entity) -> Result<(), CoreError> {
        let topic = entity.config_topic();
        match entity.publish_config(self.transport).await {
            Ok(()) => {
                info!(%topic, unique_id = entity.unique_id(), "discovery config published");
                Ok(())
            }
            Err(e) => {
                warn!(%topic, error = %e, "discovery config not delivered");
                Err(e)
            }
        }
    }
}
