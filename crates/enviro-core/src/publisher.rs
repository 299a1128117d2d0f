// ── Telemetry publisher ──
//
// One snapshot, one message: JSON body on the state topic, not retained,
// no delivery wait.

use enviro_mqtt::{Message, Publish};
use tracing::debug;

use crate::error::CoreError;
use crate::model::SensorReadings;

pub struct TelemetryPublisher {
    topic: String,
}

impl TelemetryPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Serialize and publish fire-and-forget.
    pub async fn publish<P: Publish>(
        &self,
        transport: &P,
        readings: &SensorReadings,
    ) -> Result<(), CoreError> {
        let body = readings.to_json()?;
        debug!(topic = %self.topic, bytes = body.len(), "publishing readings");
        transport.publish(Message::new(&self.topic, body)).await?;
        Ok(())
    }
}
