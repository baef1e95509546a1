//! The outbox publisher: the background half of the transactional outbox
//! pattern. The write side already lives in each command
//! handler, which stores a row in the same transaction as its domain
//! mutation via [`crate::ports::WalletUnitOfWork::store_outbox_event`]; this
//! module drains those rows to the event log independently of any request.
//!
//! A claimed-but-unpublished row is never lost: a failed append releases the
//! claim (`OutboxStore::mark_failed`) so the next poll retries it, and a
//! crashed publisher's claims are recovered the same way once another
//! publisher (or this one, restarted) next claims the table. At-least-once
//! delivery is the resulting contract; a consumer must dedup by event id.

use crate::ports::OutboxStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wallet_eventlog::EventLogPort;
use wallet_resilience::{CircuitBreaker, DegradationManager, Metrics};
use wallet_schemas::OutboxEvent;

/// Polling cadence and claim size, plus the identity this process claims
/// rows under (useful in `claimed_by` for operational debugging across a
/// fleet of publishers).
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub publisher_id: String,
}

/// Drains `outbox_events` to an [`EventLogPort`], generic over the claim
/// store so the same logic runs against Postgres in production and an
/// in-memory fake in tests.
pub struct OutboxPublisher<O, E> {
    store: Arc<O>,
    event_log: Arc<E>,
    breaker: Arc<CircuitBreaker>,
    degradation: Arc<DegradationManager>,
    metrics: Arc<Metrics>,
    config: PublisherConfig,
}

impl<O, E> OutboxPublisher<O, E>
where
    O: OutboxStore,
    E: EventLogPort,
{
    pub fn new(
        store: Arc<O>,
        event_log: Arc<E>,
        breaker: Arc<CircuitBreaker>,
        degradation: Arc<DegradationManager>,
        metrics: Arc<Metrics>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            store,
            event_log,
            breaker,
            degradation,
            metrics,
            config,
        }
    }

    /// Claim one batch and publish each row. Returns the number of rows
    /// claimed (zero means there was nothing pending at this tick).
    pub async fn publish_once(&self) -> anyhow::Result<usize> {
        let batch = self
            .store
            .claim_batch(self.config.batch_size, &self.config.publisher_id)
            .await?;
        let claimed = batch.len();
        self.metrics.incr_by("outbox.claimed", claimed as i64);
        for event in batch {
            self.publish_one(event).await;
        }
        Ok(claimed)
    }

    /// Drain every currently-pending row by looping `publish_once` until a
    /// batch comes back empty. Used by the manual-drain CLI command and by
    /// tests that want a deterministic "everything is published" point,
    /// rather than waiting out the poll cadence.
    pub async fn publish_all_pending(&self) -> anyhow::Result<usize> {
        let mut total = 0usize;
        loop {
            let claimed = self.publish_once().await?;
            total += claimed;
            if claimed == 0 {
                break;
            }
        }
        Ok(total)
    }

    /// Run the polling loop on a fixed cadence until `shutdown` reports
    /// `true`. Intended to be spawned as a long-lived background task by the
    /// composition root; a single tick only claims one batch so a deep
    /// backlog cannot starve the shutdown check.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.publish_once().await {
                        tracing::error!(error = %e, "outbox claim_batch failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("outbox publisher stopping");
                        return;
                    }
                }
            }
        }
    }

    async fn publish_one(&self, event: OutboxEvent) {
        let (allowed, transition) = self.breaker.allow_request();
        if let Some((from, to)) = transition {
            tracing::info!(
                breaker = self.breaker.name(),
                from = from.as_str(),
                to = to.as_str(),
                "outbox event-log breaker transitioned"
            );
        }
        if !allowed {
            self.metrics.incr("outbox.publish.breaker_open");
            if let Err(e) = self.store.mark_failed(event.id).await {
                tracing::error!(error = %e, outbox_id = event.id, "failed to release claim while breaker open");
            }
            return;
        }

        let payload = match serde_json::to_vec(&event.payload) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, outbox_id = event.id, "outbox payload is not serializable, leaving for manual recovery");
                self.metrics.incr("outbox.publish.serialize_error");
                let _ = self.store.mark_failed(event.id).await;
                return;
            }
        };

        let start = Instant::now();
        match self
            .event_log
            .append(event.aggregate_id, &event.event_type, &payload)
            .await
        {
            Ok(()) => {
                self.breaker.record_success();
                self.degradation.set_event_processing_degraded(false);
                self.metrics.incr("outbox.published");
                self.metrics
                    .record_timer("outbox.publish.latency", start.elapsed());
                if let Err(e) = self.store.mark_published(event.id).await {
                    tracing::error!(
                        error = %e,
                        outbox_id = event.id,
                        "event log append succeeded but marking the row published failed; it will be redelivered"
                    );
                }
            }
            Err(e) => {
                self.breaker.record_failure();
                self.degradation.set_event_processing_degraded(true);
                self.metrics.incr("outbox.publish.failed");
                tracing::warn!(error = %e, outbox_id = event.id, "event log append failed, releasing claim for retry");
                if let Err(e) = self.store.mark_failed(event.id).await {
                    tracing::error!(error = %e, outbox_id = event.id, "failed to release claim after a failed append");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct FakeStore {
        pending: Mutex<Vec<OutboxEvent>>,
        failed: Mutex<Vec<i64>>,
        published: Mutex<Vec<i64>>,
    }

    impl FakeStore {
        fn with_events(events: Vec<OutboxEvent>) -> Self {
            Self {
                pending: Mutex::new(events),
                failed: Mutex::new(Vec::new()),
                published: Mutex::new(Vec::new()),
            }
        }
    }

    impl OutboxStore for FakeStore {
        async fn claim_batch(&self, batch_size: i64, _publisher_id: &str) -> anyhow::Result<Vec<OutboxEvent>> {
            let mut pending = self.pending.lock().unwrap();
            let n = (batch_size as usize).min(pending.len());
            Ok(pending.drain(0..n).collect())
        }

        async fn mark_published(&self, outbox_id: i64) -> anyhow::Result<bool> {
            self.published.lock().unwrap().push(outbox_id);
            Ok(true)
        }

        async fn mark_failed(&self, outbox_id: i64) -> anyhow::Result<bool> {
            self.failed.lock().unwrap().push(outbox_id);
            Ok(true)
        }
    }

    struct FakeEventLog {
        fail_next: AtomicUsize,
    }

    impl FakeEventLog {
        fn always_succeeds() -> Self {
            Self {
                fail_next: AtomicUsize::new(0),
            }
        }

        fn fails_first_n(n: usize) -> Self {
            Self {
                fail_next: AtomicUsize::new(n),
            }
        }
    }

    impl EventLogPort for FakeEventLog {
        async fn append(&self, _aggregate_id: Uuid, _event_type: &str, _payload: &[u8]) -> anyhow::Result<()> {
            let remaining = self.fail_next.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("simulated event log failure");
            }
            Ok(())
        }

        async fn ping(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn sample_event(id: i64) -> OutboxEvent {
        OutboxEvent {
            id,
            aggregate_id: Uuid::new_v4(),
            event_type: "FundsDeposited".into(),
            payload: serde_json::json!({"amount": "10.00"}),
            created_at: chrono::Utc::now(),
            published_at: None,
            attempts: 0,
        }
    }

    fn publisher(store: FakeStore, event_log: FakeEventLog) -> OutboxPublisher<FakeStore, FakeEventLog> {
        OutboxPublisher::new(
            Arc::new(store),
            Arc::new(event_log),
            Arc::new(CircuitBreaker::new("outbox_test", 0.5, Duration::from_millis(50))),
            Arc::new(DegradationManager::new()),
            Arc::new(Metrics::new()),
            PublisherConfig {
                poll_interval: Duration::from_millis(10),
                batch_size: 10,
                publisher_id: "test-publisher".into(),
            },
        )
    }

    #[tokio::test]
    async fn publish_all_pending_drains_every_row() {
        let store = FakeStore::with_events(vec![sample_event(1), sample_event(2), sample_event(3)]);
        let p = publisher(store, FakeEventLog::always_succeeds());

        let total = p.publish_all_pending().await.unwrap();

        assert_eq!(total, 3);
        assert_eq!(p.metrics.counter_value("outbox.published"), 3);
        assert_eq!(p.store.published.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn a_failed_append_releases_the_claim_instead_of_marking_published() {
        let store = FakeStore::with_events(vec![sample_event(1)]);
        let p = publisher(store, FakeEventLog::fails_first_n(1));

        p.publish_once().await.unwrap();

        assert_eq!(p.store.failed.lock().unwrap(), &vec![1]);
        assert!(p.store.published.lock().unwrap().is_empty());
        assert!(p.degradation.is_event_processing_degraded());
    }

    #[tokio::test]
    async fn publish_once_on_an_empty_queue_claims_nothing() {
        let store = FakeStore::with_events(vec![]);
        let p = publisher(store, FakeEventLog::always_succeeds());

        let claimed = p.publish_once().await.unwrap();

        assert_eq!(claimed, 0);
    }
}
