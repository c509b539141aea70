//! Three-state circuit breaker guarding outbound reviewer
//! calls. Adapted from the pack's atomics-only breaker
//! (`ClaudeHydra-v4`'s `state.rs`), generalized from a two-state
//! closed/tripped design to the full CLOSED/OPEN/HALF_OPEN machine the
//! spec calls for: once the cooldown elapses exactly one trial request
//! is let through, and only that request's outcome decides whether the
//! circuit re-closes or re-opens.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

const FAILURE_THRESHOLD: u32 = 5;
const COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    tripped_at: RwLock<Option<Instant>>,
    trial_in_flight: AtomicBool,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            tripped_at: RwLock::new(None),
            trial_in_flight: AtomicBool::new(false),
        }
    }

    /// Returns `true` exactly when the caller should attempt the real
    /// request: the circuit is CLOSED, or it is past cooldown and this
    /// call has won the right to be the lone HALF_OPEN trial.
    pub async fn allow_request(&self) -> bool {
        let guard = self.tripped_at.read().await;
        let Some(tripped) = *guard else {
            return true;
        };

        if tripped.elapsed() < COOLDOWN {
            return false;
        }
        drop(guard);

        // Past cooldown: only one caller gets to run the HALF_OPEN trial.
        if self
            .trial_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::info!("forwarder circuit breaker: cooldown elapsed, admitting half-open trial");
            true
        } else {
            false
        }
    }

    pub async fn record_success(&self) {
        let was_trial = self.trial_in_flight.swap(false, Ordering::AcqRel);
        let prev = self.consecutive_failures.swap(0, Ordering::Relaxed);
        if prev > 0 || was_trial {
            let mut guard = self.tripped_at.write().await;
            *guard = None;
            tracing::info!("forwarder circuit breaker: closed (trial={was_trial}, prior failures={prev})");
        }
    }

    pub async fn record_failure(&self) {
        let was_trial = self.trial_in_flight.swap(false, Ordering::AcqRel);
        if was_trial {
            // The half-open trial failed: re-open immediately for another
            // full cooldown, regardless of the consecutive-failure count.
            let mut guard = self.tripped_at.write().await;
            *guard = Some(Instant::now());
            tracing::warn!("forwarder circuit breaker: half-open trial failed, re-opening");
            return;
        }

        let count = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= FAILURE_THRESHOLD {
            let mut guard = self.tripped_at.write().await;
            if guard.is_none() {
                *guard = Some(Instant::now());
                tracing::error!(failures = count, "forwarder circuit breaker: opened");
            }
        }
    }

    pub async fn state(&self) -> BreakerState {
        let guard = self.tripped_at.read().await;
        match *guard {
            None => BreakerState::Closed,
            Some(tripped) if tripped.elapsed() < COOLDOWN => BreakerState::Open,
            Some(_) => BreakerState::HalfOpen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_by_default() {
        let breaker = CircuitBreaker::new();
        assert_eq!(breaker.state().await, BreakerState::Closed);
        assert!(breaker.allow_request().await);
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD {
            breaker.record_failure().await;
        }
        assert_eq!(breaker.state().await, BreakerState::Open);
        assert!(!breaker.allow_request().await);
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new();
        for _ in 0..FAILURE_THRESHOLD - 1 {
            breaker.record_failure().await;
        }
        breaker.record_success().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn only_one_half_open_trial_is_admitted() {
        let breaker = CircuitBreaker::new();
        {
            let mut guard = breaker.tripped_at.write().await;
            *guard = Some(Instant::now() - COOLDOWN - Duration::from_secs(1));
        }
        assert!(breaker.allow_request().await);
        // A second concurrent caller must not also be admitted.
        assert!(!breaker.allow_request().await);
    }

    #[tokio::test]
    async fn half_open_success_closes_circuit() {
        let breaker = CircuitBreaker::new();
        {
            let mut guard = breaker.tripped_at.write().await;
            *guard = Some(Instant::now() - COOLDOWN - Duration::from_secs(1));
        }
        assert!(breaker.allow_request().await);
        breaker.record_success().await;
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_circuit() {
        let breaker = CircuitBreaker::new();
        {
            let mut guard = breaker.tripped_at.write().await;
            *guard = Some(Instant::now() - COOLDOWN - Duration::from_secs(1));
        }
        assert!(breaker.allow_request().await);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Open);
    }
}
