use serde_json::Value;
use std::time::Duration;

/// Every configuration key the wallet service recognizes. Anything outside
/// this set is reported by [`unused_pointers`] rather than silently ignored.
const RECOGNIZED_POINTERS: &[&str] = &[
    "/retry/optimistic_lock/max_attempts",
    "/retry/optimistic_lock/initial_backoff_ms",
    "/retry/transient/max_attempts",
    "/retry/transient/initial_backoff_ms",
    "/circuit/cache/failure_ratio",
    "/circuit/cache/cool_down_ms",
    "/cache/ttl_seconds",
    "/outbox/poll_interval_ms",
    "/outbox/batch_size",
    "/degradation/read_only_auto_exit",
    "/degradation/primary_health_poll_ms",
    "/degradation/primary_health_failure_threshold",
    "/degradation/primary_health_success_threshold",
    "/database/primary_url",
    "/database/replica_url",
    "/cache/url",
    "/eventlog/brokers",
    "/eventlog/topic",
    "/server/bind_addr",
];

fn get_i64(v: &Value, ptr: &str, default: i64) -> i64 {
    v.pointer(ptr).and_then(Value::as_i64).unwrap_or(default)
}

fn get_f64(v: &Value, ptr: &str, default: f64) -> f64 {
    v.pointer(ptr).and_then(Value::as_f64).unwrap_or(default)
}

fn get_bool(v: &Value, ptr: &str, default: bool) -> bool {
    v.pointer(ptr).and_then(Value::as_bool).unwrap_or(default)
}

fn get_str<'a>(v: &'a Value, ptr: &str, default: &'a str) -> &'a str {
    v.pointer(ptr).and_then(Value::as_str).unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub optimistic_lock: RetryPolicyConfig,
    pub transient: RetryPolicyConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitConfig {
    pub cache_failure_ratio: f64,
    pub cache_cool_down: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub ttl: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DegradationConfig {
    pub read_only_auto_exit: bool,
    pub primary_health_poll_interval: Duration,
    pub primary_health_failure_threshold: u32,
    pub primary_health_success_threshold: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventLogConfig {
    pub topic: String,
}

/// Typed view over the merged config JSON, with the defaults this lineage
/// ships when a key is absent. Resolved once at process start.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletSettings {
    pub retry: RetryConfig,
    pub circuit: CircuitConfig,
    pub cache: CacheConfig,
    pub outbox: OutboxConfig,
    pub degradation: DegradationConfig,
    pub server: ServerConfig,
    pub eventlog: EventLogConfig,
}

impl WalletSettings {
    pub fn from_json(v: &Value) -> Self {
        WalletSettings {
            retry: RetryConfig {
                optimistic_lock: RetryPolicyConfig {
                    max_attempts: get_i64(v, "/retry/optimistic_lock/max_attempts", 5) as u32,
                    initial_backoff: Duration::from_millis(get_i64(
                        v,
                        "/retry/optimistic_lock/initial_backoff_ms",
                        20,
                    ) as u64),
                },
                transient: RetryPolicyConfig {
                    max_attempts: get_i64(v, "/retry/transient/max_attempts", 4) as u32,
                    initial_backoff: Duration::from_millis(get_i64(
                        v,
                        "/retry/transient/initial_backoff_ms",
                        100,
                    ) as u64),
                },
            },
            circuit: CircuitConfig {
                cache_failure_ratio: get_f64(v, "/circuit/cache/failure_ratio", 0.5),
                cache_cool_down: Duration::from_millis(get_i64(
                    v,
                    "/circuit/cache/cool_down_ms",
                    5_000,
                ) as u64),
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(get_i64(v, "/cache/ttl_seconds", 60) as u64),
            },
            outbox: OutboxConfig {
                poll_interval: Duration::from_millis(get_i64(v, "/outbox/poll_interval_ms", 2_000) as u64),
                batch_size: get_i64(v, "/outbox/batch_size", 100),
            },
            degradation: DegradationConfig {
                read_only_auto_exit: get_bool(v, "/degradation/read_only_auto_exit", true),
                primary_health_poll_interval: Duration::from_millis(get_i64(
                    v,
                    "/degradation/primary_health_poll_ms",
                    2_000,
                ) as u64),
                primary_health_failure_threshold: get_i64(v, "/degradation/primary_health_failure_threshold", 3) as u32,
                primary_health_success_threshold: get_i64(v, "/degradation/primary_health_success_threshold", 2) as u32,
            },
            server: ServerConfig {
                bind_addr: get_str(v, "/server/bind_addr", "0.0.0.0:8080").to_string(),
            },
            eventlog: EventLogConfig {
                topic: get_str(v, "/eventlog/topic", "wallet.events").to_string(),
            },
        }
    }
}

impl Default for WalletSettings {
    fn default() -> Self {
        WalletSettings::from_json(&Value::Null)
    }
}

/// Recursively collect leaf pointers (objects' terminal scalar/array values)
/// present in `config` but absent from [`RECOGNIZED_POINTERS`].
///
/// Matches the reference configuration loader's posture: unknown keys are
/// reported, not rejected, except when `strict` is set (CI enforcement).
pub fn unused_pointers(config: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_leaf_pointers(config, String::new(), &mut out);
    out.retain(|p| !RECOGNIZED_POINTERS.contains(&p.as_str()));
    out.sort();
    out
}

fn collect_leaf_pointers(v: &Value, prefix: String, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            if map.is_empty() {
                out.push(prefix);
                return;
            }
            for (k, val) in map {
                collect_leaf_pointers(val, format!("{prefix}/{k}"), out);
            }
        }
        _ => out.push(prefix),
    }
}

/// Whether `strict` mode should fail the process on unused keys (CI posture)
/// versus merely warning (the default developer posture).
pub fn enforce_unused_keys(config: &Value, strict: bool) -> anyhow::Result<Vec<String>> {
    let unused = unused_pointers(config);
    if strict && !unused.is_empty() {
        anyhow::bail!(
            "CONFIG_UNUSED_KEYS: strict mode rejects unrecognized config keys: {}",
            unused.join(", ")
        );
    }
    for p in &unused {
        tracing::warn!(pointer = %p, "unrecognized config key");
    }
    Ok(unused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_when_config_is_empty() {
        let s = WalletSettings::from_json(&Value::Null);
        assert_eq!(s.retry.optimistic_lock.max_attempts, 5);
        assert_eq!(s.cache.ttl, Duration::from_secs(60));
        assert_eq!(s.outbox.batch_size, 100);
        assert!(s.degradation.read_only_auto_exit);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let v = json!({
            "retry": { "optimistic_lock": { "max_attempts": 3, "initial_backoff_ms": 10 } },
            "outbox": { "batch_size": 250 },
        });
        let s = WalletSettings::from_json(&v);
        assert_eq!(s.retry.optimistic_lock.max_attempts, 3);
        assert_eq!(s.outbox.batch_size, 250);
        assert_eq!(s.outbox.poll_interval, Duration::from_millis(2_000));
    }

    #[test]
    fn unused_keys_are_reported_as_leaf_pointers() {
        let v = json!({
            "outbox": { "batch_size": 50 },
            "unused_section": { "foo": 1, "bar": 2 },
        });
        let unused = unused_pointers(&v);
        assert!(unused.contains(&"/unused_section/foo".to_string()));
        assert!(unused.contains(&"/unused_section/bar".to_string()));
        assert!(!unused.contains(&"/outbox/batch_size".to_string()));
    }

    #[test]
    fn unused_pointers_sorted_deterministically() {
        let v = json!({ "z": { "a": 1 }, "a": { "z": 1 } });
        let unused = unused_pointers(&v);
        assert_eq!(unused, vec!["/a/z".to_string(), "/z/a".to_string()]);
    }

    #[test]
    fn strict_mode_rejects_unused_keys() {
        let v = json!({ "unused": { "x": 1 } });
        let err = enforce_unused_keys(&v, true).unwrap_err();
        assert!(format!("{err}").contains("CONFIG_UNUSED_KEYS"));
    }

    #[test]
    fn warn_mode_does_not_error_on_unused_keys() {
        let v = json!({ "unused": { "x": 1 } });
        let unused = enforce_unused_keys(&v, false).unwrap();
        assert_eq!(unused, vec!["/unused/x".to_string()]);
    }
}
