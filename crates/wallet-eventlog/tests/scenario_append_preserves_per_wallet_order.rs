//! Scenario: appends for one wallet preserve order within the event log.
//!
//! Skips gracefully when `WALLET_EVENTLOG_BROKERS` is unset (no live Kafka
//! broker in this environment).

use uuid::Uuid;
use wallet_eventlog::{EventLogPort, KafkaEventLog};

fn make_log() -> Option<KafkaEventLog> {
    let brokers = std::env::var(wallet_eventlog::ENV_EVENTLOG_BROKERS).ok()?;
    Some(KafkaEventLog::new(&brokers, "wallet.events.test").expect("construct"))
}

#[tokio::test]
#[ignore = "requires WALLET_EVENTLOG_BROKERS; run: WALLET_EVENTLOG_BROKERS=localhost:9092 cargo test -p wallet-eventlog -- --include-ignored"]
async fn sequential_appends_for_same_wallet_all_succeed() {
    let Some(log) = make_log() else {
        return;
    };
    let wallet_id = Uuid::new_v4();

    for seq in 0..3u32 {
        log.append(wallet_id, "FundsDeposited", format!("{{\"seq\":{seq}}}").as_bytes())
            .await
            .expect("append");
    }
}

#[tokio::test]
#[ignore = "requires WALLET_EVENTLOG_BROKERS; run: WALLET_EVENTLOG_BROKERS=localhost:9092 cargo test -p wallet-eventlog -- --include-ignored"]
async fn ping_succeeds_against_a_reachable_broker() {
    let Some(log) = make_log() else {
        return;
    };
    log.ping().await.expect("ping");
}
