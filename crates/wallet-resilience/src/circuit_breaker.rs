//! Circuit breakers around remote dependencies (cache, event log).
//!
//! States are `Closed` (pass-through), `Open` (fail fast to fallback) and
//! `HalfOpen` (a single probe call is allowed through to test recovery).
//! Transitions are governed by a rolling failure ratio over a minimum
//! sample size, plus a cool-down before a probe is attempted.
//!
//! This type makes no decision about *what* the fallback is - callers ask
//! [`CircuitBreaker::allow_request`] whether to attempt the guarded call at
//! all, then report the outcome back with [`CircuitBreaker::record_success`]
//! or [`CircuitBreaker::record_failure`]. The cache and event-log fallback
//! behavior lives at the call site in `wallet-engine`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

struct Window {
    state: BreakerState,
    successes: u32,
    failures: u32,
    opened_at: Option<Instant>,
    half_open_probe_in_flight: bool,
}

impl Window {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            successes: 0,
            failures: 0,
            opened_at: None,
            half_open_probe_in_flight: false,
        }
    }

    fn reset_counts(&mut self) {
        self.successes = 0;
        self.failures = 0;
    }
}

/// A single breaker instance, one per remote dependency category.
pub struct CircuitBreaker {
    name: &'static str,
    failure_ratio_threshold: f64,
    min_samples: u32,
    cool_down: Duration,
    window: Mutex<Window>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, failure_ratio_threshold: f64, cool_down: Duration) -> Self {
        Self {
            name,
            failure_ratio_threshold,
            min_samples: 5,
            cool_down,
            window: Mutex::new(Window::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> BreakerState {
        self.window.lock().expect("circuit breaker mutex poisoned").state
    }

    /// Whether a call should be attempted right now. `Closed` always allows;
    /// `Open` allows only once the cool-down has elapsed, at which point the
    /// breaker transitions to `HalfOpen` and this call *is* the probe;
    /// `HalfOpen` allows at most one in-flight probe at a time.
    ///
    /// Returns the transition taken, if any, so the caller can bump a
    /// per-breaker state-change counter.
    pub fn allow_request(&self) -> (bool, Option<(BreakerState, BreakerState)>) {
        let mut w = self.window.lock().expect("circuit breaker mutex poisoned");
        match w.state {
            BreakerState::Closed => (true, None),
            BreakerState::Open => {
                let elapsed = w.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= self.cool_down {
                    w.state = BreakerState::HalfOpen;
                    w.half_open_probe_in_flight = true;
                    tracing::info!(breaker = self.name, "circuit breaker entering half-open probe");
                    (true, Some((BreakerState::Open, BreakerState::HalfOpen)))
                } else {
                    (false, None)
                }
            }
            BreakerState::HalfOpen => {
                if w.half_open_probe_in_flight {
                    (false, None)
                } else {
                    w.half_open_probe_in_flight = true;
                    (true, None)
                }
            }
        }
    }

    /// Report a successful guarded call.
    ///
    /// Returns the transition taken, if any.
    pub fn record_success(&self) -> Option<(BreakerState, BreakerState)> {
        let mut w = self.window.lock().expect("circuit breaker mutex poisoned");
        match w.state {
            BreakerState::Closed => {
                w.successes += 1;
                None
            }
            BreakerState::HalfOpen => {
                w.half_open_probe_in_flight = false;
                w.state = BreakerState::Closed;
                w.reset_counts();
                w.opened_at = None;
                tracing::info!(breaker = self.name, "circuit breaker closed after successful probe");
                Some((BreakerState::HalfOpen, BreakerState::Closed))
            }
            BreakerState::Open => None,
        }
    }

    /// Report a failed guarded call.
    ///
    /// Returns the transition taken, if any.
    pub fn record_failure(&self) -> Option<(BreakerState, BreakerState)> {
        let mut w = self.window.lock().expect("circuit breaker mutex poisoned");
        match w.state {
            BreakerState::Closed => {
                w.failures += 1;
                let total = w.successes + w.failures;
                if total >= self.min_samples
                    && (w.failures as f64 / total as f64) >= self.failure_ratio_threshold
                {
                    w.state = BreakerState::Open;
                    w.opened_at = Some(Instant::now());
                    tracing::warn!(
                        breaker = self.name,
                        failures = w.failures,
                        total,
                        "circuit breaker opened: failure ratio exceeded"
                    );
                    Some((BreakerState::Closed, BreakerState::Open))
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => {
                w.half_open_probe_in_flight = false;
                w.state = BreakerState::Open;
                w.opened_at = Some(Instant::now());
                w.reset_counts();
                tracing::warn!(breaker = self.name, "circuit breaker reopened: probe failed");
                Some((BreakerState::HalfOpen, BreakerState::Open))
            }
            BreakerState::Open => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_closed_below_the_failure_ratio() {
        let b = CircuitBreaker::new("cache", 0.5, Duration::from_millis(50));
        for _ in 0..4 {
            b.record_success();
        }
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn opens_once_failure_ratio_and_min_samples_are_met() {
        let b = CircuitBreaker::new("cache", 0.5, Duration::from_millis(50));
        b.record_success();
        b.record_success();
        assert!(b.record_failure().is_none());
        assert!(b.record_failure().is_none());
        let transition = b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(transition, Some((BreakerState::Closed, BreakerState::Open)));
    }

    #[test]
    fn denies_requests_while_open_and_before_cool_down() {
        let b = CircuitBreaker::new("cache", 0.1, Duration::from_secs(60));
        for _ in 0..5 {
            b.record_failure();
        }
        assert_eq!(b.state(), BreakerState::Open);
        let (allowed, _) = b.allow_request();
        assert!(!allowed);
    }

    #[test]
    fn half_open_probe_success_closes_the_breaker() {
        let b = CircuitBreaker::new("cache", 0.1, Duration::from_millis(0));
        for _ in 0..5 {
            b.record_failure();
        }
        let (allowed, transition) = b.allow_request();
        assert!(allowed);
        assert_eq!(transition, Some((BreakerState::Open, BreakerState::HalfOpen)));

        let closed_transition = b.record_success();
        assert_eq!(closed_transition, Some((BreakerState::HalfOpen, BreakerState::Closed)));
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens_the_breaker() {
        let b = CircuitBreaker::new("cache", 0.1, Duration::from_millis(0));
        for _ in 0..5 {
            b.record_failure();
        }
        let (allowed, _) = b.allow_request();
        assert!(allowed);

        let reopened = b.record_failure();
        assert_eq!(reopened, Some((BreakerState::HalfOpen, BreakerState::Open)));
    }

    #[test]
    fn only_one_half_open_probe_in_flight_at_a_time() {
        let b = CircuitBreaker::new("cache", 0.1, Duration::from_millis(0));
        for _ in 0..5 {
            b.record_failure();
        }
        let (first, _) = b.allow_request();
        assert!(first);
        let (second, _) = b.allow_request();
        assert!(!second);
    }
}
