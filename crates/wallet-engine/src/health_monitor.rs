//! The primary-database health monitor: the background piece that actually
//! drives [`DegradationManager::enter_read_only`]/`exit_read_only` when the
//! primary database starts failing.
//!
//! Nothing on the write path calls `enter_read_only` directly: a single
//! transient failure on one request is just a retry, not an outage. This
//! monitor instead polls the primary on a fixed cadence, independent of
//! request traffic, and only flips the gate after a run of consecutive
//! failures (or successes) - the same "sustained" framing used for
//! cache-bypass, applied to the primary. Modeled on
//! [`crate::outbox::OutboxPublisher::run`]'s poll-loop-with-shutdown shape.

use crate::ports::PrimaryHealthProbe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wallet_resilience::DegradationManager;

/// Consecutive-failure/success thresholds and polling cadence.
#[derive(Debug, Clone, Copy)]
pub struct HealthMonitorConfig {
    pub poll_interval: Duration,
    /// Consecutive failed pings before entering read-only mode.
    pub failure_threshold: u32,
    /// Consecutive successful pings before auto-exiting read-only mode.
    /// Only consulted when `auto_exit` is set.
    pub success_threshold: u32,
    /// Mirrors `degradation.read_only_auto_exit`: when false, a probe
    /// recovery is observed (logged) but never auto-clears the flag - an
    /// operator must exit read-only mode explicitly.
    pub auto_exit: bool,
}

/// Polls a [`PrimaryHealthProbe`] and reports sustained failure/recovery to
/// a shared [`DegradationManager`].
pub struct PrimaryHealthMonitor<P> {
    probe: P,
    degradation: Arc<DegradationManager>,
    config: HealthMonitorConfig,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
}

impl<P: PrimaryHealthProbe> PrimaryHealthMonitor<P> {
    pub fn new(probe: P, degradation: Arc<DegradationManager>, config: HealthMonitorConfig) -> Self {
        Self {
            probe,
            degradation,
            config,
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
        }
    }

    /// Ping once and update the degradation gate if a threshold was
    /// crossed. Returns `true` if the ping succeeded.
    pub async fn check_once(&self) -> bool {
        match self.probe.ping().await {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                let successes = self.consecutive_successes.fetch_add(1, Ordering::SeqCst) + 1;
                if self.config.auto_exit
                    && self.degradation.is_read_only()
                    && successes >= self.config.success_threshold
                {
                    self.degradation.exit_read_only();
                }
                true
            }
            Err(e) => {
                self.consecutive_successes.store(0, Ordering::SeqCst);
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::warn!(error = %e, consecutive_failures = failures, "primary health probe failed");
                if failures >= self.config.failure_threshold && !self.degradation.is_read_only() {
                    tracing::error!(consecutive_failures = failures, "primary unreachable, entering read-only mode");
                    self.degradation.enter_read_only();
                }
                false
            }
        }
    }

    /// Run the polling loop on a fixed cadence until `shutdown` reports
    /// `true`.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("primary health monitor stopping");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct FlakyProbe {
        healthy: AtomicBool,
    }

    impl FlakyProbe {
        fn new(healthy: bool) -> Self {
            Self {
                healthy: AtomicBool::new(healthy),
            }
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }
    }

    impl PrimaryHealthProbe for FlakyProbe {
        async fn ping(&self) -> anyhow::Result<()> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                anyhow::bail!("simulated primary outage")
            }
        }
    }

    fn config() -> HealthMonitorConfig {
        HealthMonitorConfig {
            poll_interval: Duration::from_millis(10),
            failure_threshold: 3,
            success_threshold: 2,
            auto_exit: true,
        }
    }

    #[tokio::test]
    async fn a_single_failure_does_not_enter_read_only_mode() {
        let probe = FlakyProbe::new(false);
        let degradation = Arc::new(DegradationManager::new());
        let monitor = PrimaryHealthMonitor::new(probe, degradation.clone(), config());

        monitor.check_once().await;
        monitor.check_once().await;

        assert!(!degradation.is_read_only());
    }

    #[tokio::test]
    async fn sustained_failures_enter_read_only_mode() {
        let probe = FlakyProbe::new(false);
        let degradation = Arc::new(DegradationManager::new());
        let monitor = PrimaryHealthMonitor::new(probe, degradation.clone(), config());

        for _ in 0..3 {
            monitor.check_once().await;
        }

        assert!(degradation.is_read_only());
    }

    #[tokio::test]
    async fn sustained_recovery_auto_exits_read_only_mode() {
        let probe = FlakyProbe::new(false);
        let degradation = Arc::new(DegradationManager::new());
        let monitor = PrimaryHealthMonitor::new(probe, degradation.clone(), config());

        for _ in 0..3 {
            monitor.check_once().await;
        }
        assert!(degradation.is_read_only());

        probe_set_healthy(&monitor, true);
        monitor.check_once().await;
        assert!(degradation.is_read_only(), "one success should not yet clear the flag");
        monitor.check_once().await;
        assert!(!degradation.is_read_only());
    }

    #[tokio::test]
    async fn recovery_is_not_auto_applied_when_auto_exit_is_disabled() {
        let probe = FlakyProbe::new(false);
        let degradation = Arc::new(DegradationManager::new());
        let mut cfg = config();
        cfg.auto_exit = false;
        let monitor = PrimaryHealthMonitor::new(probe, degradation.clone(), cfg);

        for _ in 0..3 {
            monitor.check_once().await;
        }
        assert!(degradation.is_read_only());

        probe_set_healthy(&monitor, true);
        for _ in 0..5 {
            monitor.check_once().await;
        }
        assert!(degradation.is_read_only(), "auto_exit=false must require an operator to clear the flag");
    }

    fn probe_set_healthy(monitor: &PrimaryHealthMonitor<FlakyProbe>, healthy: bool) {
        monitor.probe.set_healthy(healthy);
    }
}
