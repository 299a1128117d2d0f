// enviro-mqtt: broker session for the enviro telemetry agent

pub mod error;
pub mod session;
pub mod transport;

use std::future::Future;

pub use error::Error;
pub use session::MqttSession;
pub use transport::{Credentials, TlsMode, TransportConfig};

/// A single outbound publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl Message {
    /// A non-retained message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    /// Mark the message as retained by the broker.
    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }

    /// Payload as UTF-8, lossy. Handy for logging and assertions.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Publishing side of a broker connection.
///
/// Implemented by [`MqttSession`]; the core crate is generic over it so the
/// sampling loop and discovery registry can run against an in-memory fake.
pub trait Publish: Send + Sync {
    /// Fire-and-forget publish (QoS 0). Returns once the request is queued.
    fn publish(&self, message: Message) -> impl Future<Output = Result<(), Error>> + Send;

    /// Publish at QoS 1 and wait until the broker acknowledges delivery.
    fn publish_acked(&self, message: Message)
    -> impl Future<Output = Result<(), Error>> + Send;
}
