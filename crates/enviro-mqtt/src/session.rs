// ── Broker session ──
//
// Owns the `rumqttc` client and drives its event loop on a background
// task. The sampling side only ever calls `publish` / `publish_acked`;
// keep-alive, reconnects and incoming control packets stay inside the
// spawned task.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, Event, EventLoop, Outgoing, Packet, QoS,
};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::{Message, Publish};

const REQUEST_CHANNEL_SIZE: usize = 32;
const DELIVERY_CHANNEL_SIZE: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Packet-level delivery progress observed by the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// A PUBLISH left the client with this packet id (0 for QoS 0).
    Sent(u16),
    /// The broker acknowledged the QoS 1 publish with this packet id.
    Acked(u16),
}

/// A connected broker session.
pub struct MqttSession {
    client: AsyncClient,
    deliveries: broadcast::Sender<Delivery>,
    /// Serializes acknowledged publishes so each waiter can pair the next
    /// outgoing packet id with its own request.
    ack_gate: Mutex<()>,
    ack_timeout: Duration,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttSession {
    /// Connect to the broker and start background I/O.
    ///
    /// Blocks until the broker answers CONNECT so an unreachable or
    /// refusing broker fails startup instead of the first publish.
    pub async fn connect(config: &TransportConfig) -> Result<Self, Error> {
        let options = config.mqtt_options()?;
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_SIZE);

        debug!(host = %config.host, port = config.port, "connecting to broker");
        tokio::time::timeout(config.connect_timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| Error::ConnectTimeout {
                timeout_secs: config.connect_timeout.as_secs(),
            })??;
        info!(
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            "connected OK"
        );

        let (deliveries, _) = broadcast::channel(DELIVERY_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(event_loop_task(
            eventloop,
            deliveries.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            client,
            deliveries,
            ack_gate: Mutex::new(()),
            ack_timeout: config.ack_timeout,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Send DISCONNECT and stop the background task.
    ///
    /// Never waits on the request queue, so shutdown also completes while
    /// the broker is offline and the queue is full.
    pub async fn shutdown(&self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "disconnect request failed (non-fatal)");
        }
        self.cancel.cancel();
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
        debug!("broker session closed");
    }
}

impl Publish for MqttSession {
    /// Queue without waiting; a full request queue (broker offline) is
    /// returned as [`Error::Client`] straight away.
    async fn publish(&self, message: Message) -> Result<(), Error> {
        self.client
            .try_publish(message.topic, QoS::AtMostOnce, message.retain, message.payload)?;
        Ok(())
    }

    async fn publish_acked(&self, message: Message) -> Result<(), Error> {
        let _gate = self.ack_gate.lock().await;
        let mut rx = self.deliveries.subscribe();
        let topic = message.topic.clone();

        // Enqueue and acknowledgement share one deadline.
        let delivered = async {
            self.client
                .publish(message.topic, QoS::AtLeastOnce, message.retain, message.payload)
                .await?;
            await_delivery(&mut rx).await
        };

        let pkid = tokio::time::timeout(self.ack_timeout, delivered)
            .await
            .map_err(|_| Error::AckTimeout {
                topic: topic.clone(),
                timeout_secs: self.ack_timeout.as_secs(),
            })??;
        trace!(%topic, pkid, "publish acknowledged");
        Ok(())
    }
}

// ── Event loop ───────────────────────────────────────────────────

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), Error> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
            return check_connack(&ack);
        }
    }
}

fn check_connack(ack: &ConnAck) -> Result<(), Error> {
    match ack.code {
        ConnectReturnCode::Success => Ok(()),
        code => Err(Error::Refused {
            code: format!("{code:?}"),
        }),
    }
}

/// Poll the event loop until cancelled, forwarding delivery progress.
///
/// Connection errors are logged and retried after a short delay;
/// `rumqttc` reconnects on the next poll.
async fn event_loop_task(
    mut eventloop: EventLoop,
    deliveries: broadcast::Sender<Delivery>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = eventloop.poll() => match event {
                Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                    let _ = deliveries.send(Delivery::Sent(pkid));
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => {
                    let _ = deliveries.send(Delivery::Acked(ack.pkid));
                }
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(
                        session_present = ack.session_present,
                        "reconnected to broker"
                    );
                }
                Ok(event) => trace!(?event, "mqtt event"),
                Err(e) => {
                    warn!(error = %e, "broker connection error, retrying");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }
}

/// Wait for the first QoS 1 packet id sent after subscribing, then for
/// the broker's PUBACK carrying the same id.
pub(crate) async fn await_delivery(
    rx: &mut broadcast::Receiver<Delivery>,
) -> Result<u16, Error> {
    let mut sent = None;
    loop {
        match rx.recv().await {
            Ok(Delivery::Sent(pkid)) if pkid != 0 && sent.is_none() => sent = Some(pkid),
            Ok(Delivery::Acked(pkid)) if sent == Some(pkid) => return Ok(pkid),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "delivery events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return Err(Error::SessionClosed),
        }
    }
}
