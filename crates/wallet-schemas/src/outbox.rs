use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A durable record of a domain event, written atomically with the state
/// change it describes, awaiting publication to the event log.
///
/// `attempts` increments on every failed publish attempt so the publisher
/// can distinguish a row that has never been tried from one that is
/// persistently failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub attempts: i32,
}

impl OutboxEvent {
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }
}
