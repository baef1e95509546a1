//! The event log port: an append-only publisher of serialized outbox
//! payloads, partitioned by aggregate id so per-wallet order is preserved.
//!
//! This port is deliberately thin. Reliability is the outbox's job (see
//! `wallet-engine`), not the transport's: the event log only needs to
//! acknowledge or fail a single append.

use anyhow::{Context, Result};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use uuid::Uuid;

pub const ENV_EVENTLOG_BROKERS: &str = "WALLET_EVENTLOG_BROKERS";

/// Append-only publisher port consumed by the outbox publisher loop.
pub trait EventLogPort: Send + Sync {
    /// Append `payload` keyed by `aggregate_id` so that, within one
    /// partition, successive appends for the same wallet preserve order.
    fn append(
        &self,
        aggregate_id: Uuid,
        event_type: &str,
        payload: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Lightweight connectivity probe consumed by the readiness surface.
    fn ping(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Kafka-backed [`EventLogPort`].
///
/// `acks=all` and `enable.idempotence=true` are set so a single append is
/// durable across the configured in-sync replica set and cannot be
/// duplicated by producer-side retries; the outbox's own at-least-once
/// contract still requires consumer-side dedup by event id
/// because a broker acknowledgment can be lost after the write itself
/// succeeds.
pub struct KafkaEventLog {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl KafkaEventLog {
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("compression.type", "snappy")
            .create()
            .context("failed to create kafka producer")?;

        Ok(Self {
            producer,
            topic: topic.into(),
            send_timeout: Duration::from_secs(5),
        })
    }

    pub fn from_env(topic: impl Into<String>) -> Result<Self> {
        let brokers = std::env::var(ENV_EVENTLOG_BROKERS)
            .with_context(|| format!("missing env var {ENV_EVENTLOG_BROKERS}"))?;
        Self::new(&brokers, topic)
    }
}

impl EventLogPort for KafkaEventLog {
    async fn append(&self, aggregate_id: Uuid, event_type: &str, payload: &[u8]) -> Result<()> {
        let key = aggregate_id.to_string();
        let record = FutureRecord::to(&self.topic).key(&key).payload(payload);

        tracing::debug!(
            aggregate_id = %aggregate_id,
            event_type,
            topic = %self.topic,
            "appending event to event log"
        );

        match self.producer.send(record, self.send_timeout).await {
            Ok((partition, offset)) => {
                tracing::debug!(partition, offset, "event log append acknowledged");
                Ok(())
            }
            Err((err, _)) => Err(anyhow::anyhow!(err)).context("event log append failed"),
        }
    }

    async fn ping(&self) -> Result<()> {
        self.producer
            .client()
            .fetch_metadata(Some(&self.topic), Duration::from_secs(5))
            .context("event log ping failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_round_trips_through_constructor() {
        let brokers = "localhost:9092";
        let log = KafkaEventLog::new(brokers, "wallet.events").expect("construct");
        assert_eq!(log.topic, "wallet.events");
    }
}
