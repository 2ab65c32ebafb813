use crate::forwarder::Forward;
use crate::models::WeatherObservation;
use async_trait::async_trait;
use futures_lite::stream::{Stream, StreamExt};
use lapin::message::Delivery;
use lapin::{options::*, types::FieldTable, Channel, Consumer};
use log::{error, info};
use thiserror::Error;
use tokio::sync::watch;

pub const CONSUMER_TAG: &str = "weather_worker";

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("failed to declare queue {queue}: {source}")]
    Declare { queue: String, source: lapin::Error },
    #[error("failed to register consumer on queue {queue}: {source}")]
    Subscribe { queue: String, source: lapin::Error },
    #[error("error in delivery stream: {0}")]
    Delivery(#[source] lapin::Error),
    #[error("failed to settle delivery {tag}: {source}")]
    Settle { tag: u64, source: lapin::Error },
    #[error("delivery stream closed by the broker")]
    StreamClosed,
}

/// What happens to a delivery once its payload has been handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message from the queue.
    Ack,
    /// Discard the message without requeueing it.
    Reject,
}

impl Disposition {
    pub fn ack_options() -> BasicAckOptions {
        BasicAckOptions { multiple: false }
    }

    pub fn nack_options() -> BasicNackOptions {
        BasicNackOptions {
            multiple: false,
            requeue: false,
        }
    }
}

/// A delivery as seen by the worker.
#[async_trait]
pub trait Incoming: Send + Sync {
    fn body(&self) -> &[u8];

    fn tag(&self) -> u64;

    async fn settle(&self, disposition: Disposition) -> lapin::Result<()>;
}

#[async_trait]
impl Incoming for Delivery {
    fn body(&self) -> &[u8] {
        &self.data
    }

    fn tag(&self) -> u64 {
        self.delivery_tag
    }

    async fn settle(&self, disposition: Disposition) -> lapin::Result<()> {
        match disposition {
            Disposition::Ack => self.ack(Disposition::ack_options()).await.map(|_| ()),
            Disposition::Reject => self.nack(Disposition::nack_options()).await.map(|_| ()),
        }
    }
}

fn durable_queue_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        auto_delete: false,
        exclusive: false,
        ..QueueDeclareOptions::default()
    }
}

fn manual_ack_options() -> BasicConsumeOptions {
    BasicConsumeOptions {
        no_ack: false,
        exclusive: false,
        ..BasicConsumeOptions::default()
    }
}

/// Declares `queue` as durable and registers a manual-ack consumer on it.
pub async fn subscribe(channel: &Channel, queue: &str) -> Result<Consumer, ConsumerError> {
    let declared = channel
        .queue_declare(queue, durable_queue_options(), FieldTable::default())
        .await
        .map_err(|source| ConsumerError::Declare {
            queue: queue.to_string(),
            source,
        })?;
    info!("Declared queue {}", declared.name());

    channel
        .basic_consume(
            queue,
            CONSUMER_TAG,
            manual_ack_options(),
            FieldTable::default(),
        )
        .await
        .map_err(|source| ConsumerError::Subscribe {
            queue: queue.to_string(),
            source,
        })
}

/// Decodes one payload and hands it to the forwarder.
///
/// Malformed payloads are rejected and never forwarded. Once decoded, a
/// payload is acknowledged whatever the forwarder reports.
pub async fn process_payload<F>(body: &[u8], forwarder: &F) -> Disposition
where
    F: Forward + ?Sized,
{
    let observation = match WeatherObservation::from_payload(body) {
        Ok(observation) => observation,
        Err(e) => {
            error!("Failed to decode weather observation: {}", e);
            return Disposition::Reject;
        }
    };

    if let Err(e) = forwarder.send(&observation).await {
        error!("Failed to forward observation to backend: {}", e);
    }

    Disposition::Ack
}

/// Drains a delivery stream one message at a time until shutdown is
/// signalled or the stream stops.
pub struct Worker<S, F> {
    deliveries: S,
    forwarder: F,
    shutdown: watch::Receiver<bool>,
}

impl<S, D, F> Worker<S, F>
where
    S: Stream<Item = lapin::Result<D>> + Unpin,
    D: Incoming,
    F: Forward,
{
    pub fn new(deliveries: S, forwarder: F, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            deliveries,
            forwarder,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<(), ConsumerError> {
        loop {
            let next = tokio::select! {
                biased;
                // A dropped sender also stops the worker.
                _ = self.shutdown.changed() => {
                    info!("Shutdown requested, stopping worker");
                    return Ok(());
                }
                next = self.deliveries.next() => next,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => return Err(ConsumerError::Delivery(e)),
                None => return Err(ConsumerError::StreamClosed),
            };

            info!(
                "Received message {}: {}",
                delivery.tag(),
                String::from_utf8_lossy(delivery.body())
            );
            let disposition = process_payload(delivery.body(), &self.forwarder).await;
            delivery
                .settle(disposition)
                .await
                .map_err(|source| ConsumerError::Settle {
                    tag: delivery.tag(),
                    source,
                })?;
        }
    }
}
