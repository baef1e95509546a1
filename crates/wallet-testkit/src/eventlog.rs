//! An in-memory stand-in for [`wallet_eventlog::EventLogPort`], recording
//! every append in order so tests can assert per-wallet partition ordering
//! without a live Kafka broker.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use wallet_eventlog::EventLogPort;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendedEvent {
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: Vec<u8>,
}

#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    appended: Arc<Mutex<Vec<AppendedEvent>>>,
    fail_next_append: Arc<AtomicUsize>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `append` fail, to exercise the outbox
    /// publisher's breaker and degradation-flag transitions.
    pub fn fail_next_append(&self, n: usize) {
        self.fail_next_append.store(n, Ordering::SeqCst);
    }

    pub async fn appended(&self) -> Vec<AppendedEvent> {
        self.appended.lock().await.clone()
    }

    /// All appends for one aggregate, in the order they were sent - the
    /// invariant per-wallet ordering exists to preserve.
    pub async fn appended_for(&self, aggregate_id: Uuid) -> Vec<AppendedEvent> {
        self.appended
            .lock()
            .await
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }
}

impl EventLogPort for InMemoryEventLog {
    async fn append(&self, aggregate_id: Uuid, event_type: &str, payload: &[u8]) -> Result<()> {
        let remaining = self.fail_next_append.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_append.fetch_sub(1, Ordering::SeqCst);
            anyhow::bail!("simulated event log append failure");
        }
        self.appended.lock().await.push(AppendedEvent {
            aggregate_id,
            event_type: event_type.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
