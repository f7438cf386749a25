/// Fixed-pause retry policy for classifier calls.
///
/// The policy only answers "may I try again" and "how long do I wait"; the
/// actual waiting goes through a [`RetryClock`] so tests can observe pauses
/// without sleeping.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one.
    pub max_attempts: usize,
    /// Pause inserted before every attempt after the first.
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            pause: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: usize, pause: Duration) -> Self {
        Self {
            max_attempts,
            pause,
        }
    }

    /// Pause before the given zero-based attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.pause
        }
    }

    #[must_use]
    pub const fn can_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    /// Upper bound on wall time one item can spend under this policy.
    #[must_use]
    pub fn worst_case(&self, call_timeout: Duration) -> Duration {
        let attempts = u32::try_from(self.max_attempts).unwrap_or(u32::MAX);
        (call_timeout + self.pause).saturating_mul(attempts)
    }
}

#[async_trait]
pub trait RetryClock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl RetryClock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Clock that records requested pauses and returns immediately.
#[derive(Debug, Default, Clone)]
pub struct RecordingClock {
    pauses: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RetryClock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        if let Ok(mut guard) = self.pauses.lock() {
            guard.push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_has_no_pause() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
    }

    #[test]
    fn can_retry_respects_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        assert!(policy.can_retry(0));
        assert!(policy.can_retry(2));
        assert!(!policy.can_retry(3));
    }

    #[test]
    fn worst_case_bounds_attempts_times_timeout_plus_pause() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.worst_case(Duration::from_secs(30)),
            Duration::from_secs(93)
        );
    }

    #[tokio::test]
    async fn recording_clock_skips_zero_pauses() {
        let clock = RecordingClock::new();
        clock.sleep(Duration::ZERO).await;
        clock.sleep(Duration::from_secs(1)).await;
        assert_eq!(clock.pauses(), vec![Duration::from_secs(1)]);
    }
}
