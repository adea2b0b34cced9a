//! Deadline tracking for the polling loops.
//!
//! The scheduler offers no push interface, so every wait is a bounded
//! polling loop. Each loop re-checks its deadline on every iteration,
//! keeping the worst-case wait to the configured budget plus one sleep
//! interval.

use std::time::{Duration, Instant};

/// Wall-clock deadline for one connect or cancel invocation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start the clock now.
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// True once the budget has been spent.
    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    /// Time since the deadline was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.start.elapsed())
    }

    /// The configured budget in whole seconds, for error reporting.
    pub fn budget_seconds(&self) -> u64 {
        self.budget.as_secs()
    }
}

/// Fixed sleep intervals for the three polling loops.
#[derive(Debug, Clone, Copy)]
pub struct PollIntervals {
    /// Between scheduler queries while the job is pending.
    pub job_state: Duration,
    /// Between TCP probes while the node's listener comes up.
    pub reachability: Duration,
    /// Between cancellation sweeps in the administrative drain.
    pub cancel: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            job_state: Duration::from_secs(5),
            reachability: Duration::from_secs(1),
            cancel: Duration::from_secs(2),
        }
    }
}

impl PollIntervals {
    /// Reject zero intervals, which would turn the polls into busy loops.
    pub fn validate(&self) -> Result<(), IntervalError> {
        for (name, interval) in [
            ("job_state", self.job_state),
            ("reachability", self.reachability),
            ("cancel", self.cancel),
        ] {
            if interval.is_zero() {
                return Err(IntervalError::Zero { name });
            }
        }
        Ok(())
    }
}

/// Poll interval validation errors.
#[derive(Debug, thiserror::Error)]
pub enum IntervalError {
    #[error("{name} poll interval must be non-zero")]
    Zero { name: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_fresh_deadline_not_expired() {
        let deadline = Deadline::new(Duration::from_secs(10));
        assert!(!deadline.expired());
        assert!(deadline.remaining() <= Duration::from_secs(10));
    }

    #[test]
    fn test_zero_budget_expires_immediately() {
        let deadline = Deadline::new(Duration::ZERO);
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_deadline_expires_after_budget() {
        let deadline = Deadline::new(Duration::from_millis(20));
        sleep(Duration::from_millis(30));
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_budget_seconds() {
        let deadline = Deadline::new(Duration::from_secs(300));
        assert_eq!(deadline.budget_seconds(), 300);
    }

    #[test]
    fn test_default_intervals() {
        let intervals = PollIntervals::default();
        assert_eq!(intervals.job_state, Duration::from_secs(5));
        assert_eq!(intervals.reachability, Duration::from_secs(1));
        assert_eq!(intervals.cancel, Duration::from_secs(2));
        assert!(intervals.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let intervals = PollIntervals {
            job_state: Duration::ZERO,
            ..PollIntervals::default()
        };
        assert!(matches!(
            intervals.validate(),
            Err(IntervalError::Zero { name: "job_state" })
        ));
    }
}
