//! Per-profile circuit breaker.
//!
//! Three states: closed (normal), open (rejecting), half-open (probing).
//! See the provider rotation design for the exact transition rules.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tl_domain::trace::TraceEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn label(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

struct Inner {
    state: CircuitState,
    failures: u32,
    half_open_successes: u32,
    last_transition_at: Instant,
}

/// Tracks the health of one provider profile and decides whether calls
/// against it are currently permitted.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    open_timeout: Duration,
    half_open_target: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, open_timeout: Duration, half_open_target: u32) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            open_timeout,
            half_open_target: half_open_target.max(1),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                half_open_successes: 0,
                last_transition_at: Instant::now(),
            }),
        }
    }

    /// Current state, self-healing `open -> half_open` once the timeout
    /// has elapsed. Call this immediately before deciding whether to
    /// attempt a call against this profile.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open && inner.last_transition_at.elapsed() >= self.open_timeout {
            self.transition(&mut inner, CircuitState::HalfOpen);
        }
        inner.state
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.half_open_target {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {
                inner.last_transition_at = Instant::now();
            }
        }
    }

    /// Reset always resets counters and returns the circuit to closed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Closed);
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.failures = 0;
        inner.half_open_successes = 0;
        inner.last_transition_at = Instant::now();
        if from != to {
            TraceEvent::CircuitTransition {
                profile: self.name.clone(),
                from: from.label().to_string(),
                to: to.label().to_string(),
            }
            .emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", 3, Duration::from_millis(20), 2)
    }

    #[test]
    fn starts_closed() {
        assert_eq!(breaker().state(), CircuitState::Closed);
    }

    #[test]
    fn trips_open_after_threshold_failures() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_failure_count_in_closed_state() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed, "counter should have reset on success");
    }

    #[test]
    fn open_transitions_to_half_open_after_timeout() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        sleep(Duration::from_millis(30));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_target_consecutive_successes() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        sleep(Duration::from_millis(30));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen, "needs 2 consecutive successes");
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_circuit() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        sleep(Duration::from_millis(30));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn reset_returns_to_closed() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_failure();
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
