//! Retry budget and backoff for transiently failed probes.
//!
//! Only resource exhaustion (the OS refusing to hand out another socket)
//! is retried. Each retry waits linearly longer than the last; once the
//! budget is spent the job is dropped.

use crate::types::Target;
use std::sync::Arc;
use std::time::Duration;

/// Number of retries every job starts with.
pub const MAX_RETRIES: u8 = 3;

/// Backoff step between consecutive retries.
pub const BACKOFF_UNIT: Duration = Duration::from_secs(2);

/// One (target, port) probe and the retries it has left.
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub target: Arc<Target>,
    pub port: u16,
    pub retries_left: u8,
}

impl ScanJob {
    /// Create a job with the full retry budget.
    pub fn new(target: Arc<Target>, port: u16) -> Self {
        Self {
            target,
            port,
            retries_left: MAX_RETRIES,
        }
    }
}

/// What to do with a job whose attempt hit resource exhaustion.
#[derive(Debug)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry { delay: Duration, job: ScanJob },
    /// Budget spent; give up on the job.
    Exhausted,
}

/// Linear backoff: `(max_retries - retries_left) * backoff_unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u8,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff_unit: BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying a job that currently has `retries_left`.
    pub fn delay(&self, retries_left: u8) -> Duration {
        self.backoff_unit * u32::from(self.max_retries.saturating_sub(retries_left))
    }

    /// Decide the fate of a job that just failed transiently.
    pub fn next(&self, job: &ScanJob) -> RetryDecision {
        if job.retries_left == 0 {
            return RetryDecision::Exhausted;
        }

        RetryDecision::Retry {
            delay: self.delay(job.retries_left),
            job: ScanJob {
                target: Arc::clone(&job.target),
                port: job.port,
                retries_left: job.retries_left - 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn job() -> ScanJob {
        ScanJob::new(Arc::new(Target::literal(Ipv4Addr::LOCALHOST)), 80)
    }

    #[test]
    fn test_new_job_has_full_budget() {
        assert_eq!(job().retries_left, MAX_RETRIES);
        assert_eq!(MAX_RETRIES, 3);
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(3), Duration::ZERO);
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(1), Duration::from_secs(4));
    }

    #[test]
    fn test_budget_runs_out() {
        let policy = RetryPolicy::default();
        let mut current = job();
        let mut delays = Vec::new();

        loop {
            match policy.next(&current) {
                RetryDecision::Retry { delay, job } => {
                    delays.push(delay);
                    current = job;
                }
                RetryDecision::Exhausted => break,
            }
        }

        assert_eq!(
            delays,
            [Duration::ZERO, Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_retry_keeps_target_and_port() {
        let RetryDecision::Retry { job: retried, .. } = RetryPolicy::default().next(&job()) else {
            panic!("expected a retry");
        };
        assert_eq!(retried.port, 80);
        assert_eq!(retried.target.name(), "127.0.0.1");
        assert_eq!(retried.retries_left, MAX_RETRIES - 1);
    }
}
