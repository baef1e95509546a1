//! The observability surface: counters, gauges and timers consumed by an
//! external exporter. This crate owns only the named,
//! in-process registry; shipping a measurement to Prometheus/StatsD/etc. is
//! explicitly out of scope.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct TimerStat {
    count: u64,
    total_micros: u128,
    max_micros: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    pub count: u64,
    pub avg_micros: u64,
    pub max_micros: u64,
}

/// A simple atomic-backed measurement registry: named counters, gauges and
/// timers. `snapshot()` produces a serializable view a transport layer can
/// expose on a diagnostics endpoint.
#[derive(Default)]
pub struct Metrics {
    counters: Mutex<BTreeMap<String, i64>>,
    gauges: Mutex<BTreeMap<String, i64>>,
    timers: Mutex<BTreeMap<String, TimerStat>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, name: &str) {
        self.incr_by(name, 1);
    }

    pub fn incr_by(&self, name: &str, delta: i64) {
        let mut counters = self.counters.lock().expect("metrics counters mutex poisoned");
        *counters.entry(name.to_string()).or_insert(0) += delta;
    }

    pub fn set_gauge(&self, name: &str, value: i64) {
        let mut gauges = self.gauges.lock().expect("metrics gauges mutex poisoned");
        gauges.insert(name.to_string(), value);
    }

    pub fn record_timer(&self, name: &str, elapsed: Duration) {
        let micros = elapsed.as_micros();
        let mut timers = self.timers.lock().expect("metrics timers mutex poisoned");
        let stat = timers.entry(name.to_string()).or_default();
        stat.count += 1;
        stat.total_micros += micros;
        stat.max_micros = stat.max_micros.max(micros);
    }

    pub fn counter_value(&self, name: &str) -> i64 {
        self.counters
            .lock()
            .expect("metrics counters mutex poisoned")
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.counters.lock().expect("metrics counters mutex poisoned").clone();
        let gauges = self.gauges.lock().expect("metrics gauges mutex poisoned").clone();
        let timers = self
            .timers
            .lock()
            .expect("metrics timers mutex poisoned")
            .iter()
            .map(|(k, v)| {
                let avg = if v.count > 0 {
                    (v.total_micros / v.count as u128) as u64
                } else {
                    0
                };
                (
                    k.clone(),
                    TimerSnapshot {
                        count: v.count,
                        avg_micros: avg,
                        max_micros: v.max_micros as u64,
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            counters,
            gauges,
            timers,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, i64>,
    pub gauges: BTreeMap<String, i64>,
    pub timers: BTreeMap<String, TimerSnapshot>,
}

/// RAII helper: records elapsed time to `name` on drop. Used at call sites
/// that can't conveniently wrap a whole async block in a `let _ =
/// record_timer(...)` closure.
pub struct TimerGuard<'a> {
    metrics: &'a Metrics,
    name: String,
    start: std::time::Instant,
}

impl<'a> TimerGuard<'a> {
    pub fn start(metrics: &'a Metrics, name: impl Into<String>) -> Self {
        Self {
            metrics,
            name: name.into(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.metrics.record_timer(&self.name, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_by_name() {
        let m = Metrics::new();
        m.incr("bus.dispatch.deposit");
        m.incr("bus.dispatch.deposit");
        m.incr_by("bus.dispatch.deposit", 3);
        assert_eq!(m.counter_value("bus.dispatch.deposit"), 5);
    }

    #[test]
    fn gauges_overwrite_rather_than_accumulate() {
        let m = Metrics::new();
        m.set_gauge("wallet.total_balance", 100);
        m.set_gauge("wallet.total_balance", 250);
        assert_eq!(m.snapshot().gauges.get("wallet.total_balance"), Some(&250));
    }

    #[test]
    fn timer_snapshot_reports_count_and_max() {
        let m = Metrics::new();
        m.record_timer("handler.deposit", Duration::from_millis(10));
        m.record_timer("handler.deposit", Duration::from_millis(30));
        let snap = m.snapshot();
        let stat = snap.timers.get("handler.deposit").unwrap();
        assert_eq!(stat.count, 2);
        assert_eq!(stat.max_micros, 30_000);
        assert_eq!(stat.avg_micros, 20_000);
    }

    #[test]
    fn timer_guard_records_on_drop() {
        let m = Metrics::new();
        {
            let _g = TimerGuard::start(&m, "scoped.op");
        }
        assert_eq!(m.snapshot().timers.get("scoped.op").unwrap().count, 1);
    }
}
