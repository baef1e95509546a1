//! Process-wide degradation state machine.
//!
//! Three independent flags - `read_only_mode`, `cache_bypass_mode`,
//! `event_processing_degraded` - encapsulated in one component with atomic
//! transitions. Global mutable state for degradation is legitimate here, but
//! it lives in a single owner with explicit observers rather than scattered
//! mutable globals.

use crate::circuit_breaker::BreakerState;
use std::sync::atomic::{AtomicBool, Ordering};
use wallet_schemas::{DegradationCode, WalletError};

/// Composite health: a 0-100 score plus a human-readable summary, consumed
/// by the degradation health probe.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub score: u8,
    pub summary: String,
    pub read_only_mode: bool,
    pub cache_bypass_mode: bool,
    pub event_processing_degraded: bool,
}

/// The process-wide degradation manager. One instance is shared (behind an
/// `Arc`) across the bus, handlers and the outbox publisher.
pub struct DegradationManager {
    read_only_mode: AtomicBool,
    cache_bypass_mode: AtomicBool,
    event_processing_degraded: AtomicBool,
}

impl Default for DegradationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DegradationManager {
    pub fn new() -> Self {
        Self {
            read_only_mode: AtomicBool::new(false),
            cache_bypass_mode: AtomicBool::new(false),
            event_processing_degraded: AtomicBool::new(false),
        }
    }

    /// Entered on primary-database failures: writes are rejected fast,
    /// reads continue via the replica.
    pub fn enter_read_only(&self) {
        if !self.read_only_mode.swap(true, Ordering::SeqCst) {
            tracing::warn!("entering READ_ONLY_MODE");
        }
    }

    pub fn exit_read_only(&self) {
        if self.read_only_mode.swap(false, Ordering::SeqCst) {
            tracing::info!("exiting READ_ONLY_MODE");
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only_mode.load(Ordering::SeqCst)
    }

    /// Entered on sustained cache failures: reads skip the cache layer
    /// until the health probe recovers.
    pub fn enter_cache_bypass(&self) {
        if !self.cache_bypass_mode.swap(true, Ordering::SeqCst) {
            tracing::warn!("entering CACHE_BYPASS mode");
        }
    }

    pub fn exit_cache_bypass(&self) {
        if self.cache_bypass_mode.swap(false, Ordering::SeqCst) {
            tracing::info!("exiting CACHE_BYPASS mode");
        }
    }

    /// Drives `cache_bypass_mode` from a cache [`CircuitBreaker`]'s own
    /// state transition: a breaker opening (sustained cache failures)
    /// enters bypass, and a breaker closing again after a successful
    /// half-open probe exits it. A transition into `HalfOpen` is just a
    /// single probe in flight and does not change the flag either way.
    pub fn apply_cache_breaker_transition(&self, transition: Option<(BreakerState, BreakerState)>) {
        match transition {
            Some((_, BreakerState::Open)) => self.enter_cache_bypass(),
            Some((_, BreakerState::Closed)) => self.exit_cache_bypass(),
            Some((_, BreakerState::HalfOpen)) | None => {}
        }
    }

    pub fn is_cache_bypass(&self) -> bool {
        self.cache_bypass_mode.load(Ordering::SeqCst)
    }

    /// Set on outbox publisher failures: writes still commit, but the
    /// downstream audit trail is delayed.
    pub fn set_event_processing_degraded(&self, degraded: bool) {
        let previous = self.event_processing_degraded.swap(degraded, Ordering::SeqCst);
        if previous != degraded {
            if degraded {
                tracing::warn!("entering EVENT_PROCESSING_DEGRADED mode");
            } else {
                tracing::info!("exiting EVENT_PROCESSING_DEGRADED mode");
            }
        }
    }

    pub fn is_event_processing_degraded(&self) -> bool {
        self.event_processing_degraded.load(Ordering::SeqCst)
    }

    /// The gate every mutating handler calls before touching the database
    ///: fails fast with `ServiceDegraded{READ_ONLY_MODE}`
    /// while read-only mode is active.
    pub fn gate_mutation(&self) -> Result<(), WalletError> {
        if self.is_read_only() {
            Err(WalletError::ServiceDegraded {
                code: DegradationCode::ReadOnlyMode,
            })
        } else {
            Ok(())
        }
    }

    /// Composite health score: 100 minus a fixed penalty per active flag,
    /// floored at 0. Read-only mode is weighted heaviest since it blocks
    /// all mutation.
    pub fn health_score(&self) -> u8 {
        let mut score: i16 = 100;
        if self.is_read_only() {
            score -= 60;
        }
        if self.is_cache_bypass() {
            score -= 20;
        }
        if self.is_event_processing_degraded() {
            score -= 20;
        }
        score.max(0) as u8
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let read_only = self.is_read_only();
        let cache_bypass = self.is_cache_bypass();
        let event_degraded = self.is_event_processing_degraded();
        let score = self.health_score();

        let summary = if score == 100 {
            "healthy".to_string()
        } else {
            let mut flags = Vec::new();
            if read_only {
                flags.push("READ_ONLY_MODE");
            }
            if cache_bypass {
                flags.push("CACHE_BYPASS");
            }
            if event_degraded {
                flags.push("EVENT_PROCESSING_DEGRADED");
            }
            format!("degraded: {}", flags.join(", "))
        };

        HealthSnapshot {
            score,
            summary,
            read_only_mode: read_only,
            cache_bypass_mode: cache_bypass,
            event_processing_degraded: event_degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_by_default() {
        let m = DegradationManager::new();
        assert_eq!(m.health_score(), 100);
        assert!(m.gate_mutation().is_ok());
    }

    #[test]
    fn read_only_mode_blocks_mutation_gate() {
        let m = DegradationManager::new();
        m.enter_read_only();
        let err = m.gate_mutation().unwrap_err();
        assert!(matches!(
            err,
            WalletError::ServiceDegraded {
                code: DegradationCode::ReadOnlyMode
            }
        ));
        assert_eq!(m.health_score(), 40);
    }

    #[test]
    fn exiting_read_only_reopens_the_mutation_gate() {
        let m = DegradationManager::new();
        m.enter_read_only();
        m.exit_read_only();
        assert!(m.gate_mutation().is_ok());
        assert_eq!(m.health_score(), 100);
    }

    #[test]
    fn cache_breaker_opening_enters_cache_bypass() {
        let m = DegradationManager::new();
        m.apply_cache_breaker_transition(Some((BreakerState::Closed, BreakerState::Open)));
        assert!(m.is_cache_bypass());
    }

    #[test]
    fn cache_breaker_closing_after_a_probe_exits_cache_bypass() {
        let m = DegradationManager::new();
        m.apply_cache_breaker_transition(Some((BreakerState::Closed, BreakerState::Open)));
        assert!(m.is_cache_bypass());
        m.apply_cache_breaker_transition(Some((BreakerState::Open, BreakerState::HalfOpen)));
        assert!(m.is_cache_bypass(), "half-open probe alone must not clear bypass");
        m.apply_cache_breaker_transition(Some((BreakerState::HalfOpen, BreakerState::Closed)));
        assert!(!m.is_cache_bypass());
    }

    #[test]
    fn no_transition_leaves_cache_bypass_unchanged() {
        let m = DegradationManager::new();
        m.apply_cache_breaker_transition(None);
        assert!(!m.is_cache_bypass());
    }

    #[test]
    fn all_three_flags_compound_in_the_health_score() {
        let m = DegradationManager::new();
        m.enter_read_only();
        m.enter_cache_bypass();
        m.set_event_processing_degraded(true);
        assert_eq!(m.health_score(), 0);
        let snap = m.snapshot();
        assert!(snap.summary.contains("READ_ONLY_MODE"));
        assert!(snap.summary.contains("CACHE_BYPASS"));
        assert!(snap.summary.contains("EVENT_PROCESSING_DEGRADED"));
    }
}
