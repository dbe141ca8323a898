//! Count-based circuit breaker guarding the generation backend.
//!
//! One breaker exists per backend key and is shared by every session
//! targeting that backend, so the holder is `Arc<Mutex<CircuitBreaker>>`;
//! the lock is held only for record/allow operations, never across the
//! backend call itself.

use std::time::{Duration, Instant};

use crate::config::BreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    failure_count: u32,
    last_failure: Option<Instant>,
    state: BreakerState,
    error_threshold: u32,
    window: Duration,
    recovery: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            failure_count: 0,
            last_failure: None,
            state: BreakerState::Closed,
            error_threshold: config.error_threshold.max(1),
            window: Duration::from_secs(config.window_secs),
            recovery: Duration::from_secs(config.recovery_secs),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// May a request go out right now? An open breaker admits a single
    /// probe once the recovery timeout has elapsed.
    pub fn allow_request(&mut self) -> bool {
        self.allow_request_at(Instant::now())
    }

    fn allow_request_at(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let recovered = self
                    .last_failure
                    .map(|t| now.duration_since(t) >= self.recovery)
                    .unwrap_or(true);
                if recovered {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a backend failure. A previous failure older than the window
    /// resets the count before this one is added; the breaker opens once
    /// the count reaches the threshold (and re-opens on a failed probe).
    pub fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    fn record_failure_at(&mut self, now: Instant) {
        if let Some(last) = self.last_failure {
            if now.duration_since(last) > self.window {
                self.failure_count = 0;
            }
        }
        self.failure_count += 1;
        self.last_failure = Some(now);

        if self.state == BreakerState::HalfOpen || self.failure_count >= self.error_threshold {
            self.state = BreakerState::Open;
        }
    }

    /// A clean backend round-trip closes the breaker entirely.
    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.last_failure = None;
        self.state = BreakerState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(&BreakerConfig {
            error_threshold: 3,
            window_secs: 60,
            recovery_secs: 30,
        })
    }

    #[test]
    fn starts_closed_and_allows_requests() {
        let mut b = breaker();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.allow_request());
    }

    #[test]
    fn opens_at_threshold_within_window() {
        let mut b = breaker();
        let t0 = Instant::now();
        b.record_failure_at(t0);
        b.record_failure_at(t0 + Duration::from_secs(1));
        assert_eq!(b.state(), BreakerState::Closed);

        b.record_failure_at(t0 + Duration::from_secs(2));
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.allow_request_at(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn stale_failure_resets_count_before_recording() {
        let mut b = breaker();
        let t0 = Instant::now();
        b.record_failure_at(t0);
        b.record_failure_at(t0 + Duration::from_secs(1));

        // 61s later the earlier failures have aged out of the window:
        // the count restarts at 1 and the breaker stays closed.
        b.record_failure_at(t0 + Duration::from_secs(62));
        assert_eq!(b.failure_count(), 1);
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn success_resets_regardless_of_prior_count() {
        let mut b = breaker();
        let t0 = Instant::now();
        for i in 0..5 {
            b.record_failure_at(t0 + Duration::from_secs(i));
        }
        assert_eq!(b.state(), BreakerState::Open);

        b.record_success();
        assert_eq!(b.failure_count(), 0);
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.allow_request());
    }

    #[test]
    fn open_breaker_admits_probe_after_recovery() {
        let mut b = breaker();
        let t0 = Instant::now();
        for i in 0..3 {
            b.record_failure_at(t0 + Duration::from_secs(i));
        }
        assert!(!b.allow_request_at(t0 + Duration::from_secs(10)));

        // Recovery elapsed: one probe is admitted and the state moves to
        // half-open.
        assert!(b.allow_request_at(t0 + Duration::from_secs(40)));
        assert_eq!(b.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn failed_probe_reopens() {
        let mut b = breaker();
        let t0 = Instant::now();
        for i in 0..3 {
            b.record_failure_at(t0 + Duration::from_secs(i));
        }
        assert!(b.allow_request_at(t0 + Duration::from_secs(40)));

        b.record_failure_at(t0 + Duration::from_secs(41));
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.allow_request_at(t0 + Duration::from_secs(42)));
    }

    #[test]
    fn successful_probe_closes() {
        let mut b = breaker();
        let t0 = Instant::now();
        for i in 0..3 {
            b.record_failure_at(t0 + Duration::from_secs(i));
        }
        assert!(b.allow_request_at(t0 + Duration::from_secs(40)));

        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.allow_request_at(t0 + Duration::from_secs(41)));
    }
}
