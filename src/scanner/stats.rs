//! Scan diagnostics.
//!
//! Counts what happened to every job and logs the outcomes that never
//! reach the result store (unknown errors, dropped jobs). A [`ScanStats`]
//! is created per scan and passed to the engine explicitly.

use crate::scanner::probe::Outcome;
use crate::scanner::retry::ScanJob;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Live counters for a running scan.
#[derive(Debug, Default)]
pub struct ScanStats {
    jobs: AtomicU64,
    open: AtomicU64,
    closed: AtomicU64,
    filtered: AtomicU64,
    timed_out: AtomicU64,
    unknown: AtomicU64,
    dropped: AtomicU64,
    retries: AtomicU64,
    deferrals: AtomicU64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A job was submitted.
    pub fn job_submitted(&self) {
        self.jobs.fetch_add(1, Ordering::Relaxed);
    }

    /// The throttle turned a job away; it will be resubmitted.
    pub fn deferred(&self, job: &ScanJob) {
        self.deferrals.fetch_add(1, Ordering::Relaxed);
        trace!(host = %job.target, port = job.port, "No free connection slot, deferring");
    }

    /// A job hit resource exhaustion and will be retried.
    pub fn retrying(&self, job: &ScanJob, err: &io::Error) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        debug!(
            host = %job.target,
            port = job.port,
            retries_left = job.retries_left,
            "Out of sockets ({}), retrying",
            err
        );
    }

    /// A job spent its retry budget and was given up on.
    pub fn dropped(&self, job: &ScanJob) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            host = %job.target,
            port = job.port,
            "Retry budget exhausted, port not scanned"
        );
    }

    /// A job reached a terminal outcome.
    pub fn resolved(&self, job: &ScanJob, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Open => &self.open,
            Outcome::Closed => &self.closed,
            Outcome::Filtered => &self.filtered,
            Outcome::TimedOut => &self.timed_out,
            Outcome::Unknown(e) => {
                debug!(host = %job.target, port = job.port, "Connect failed: {}", e);
                &self.unknown
            }
            Outcome::Exhausted(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn summary(&self) -> ScanSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ScanSummary {
            jobs: load(&self.jobs),
            open: load(&self.open),
            closed: load(&self.closed),
            filtered: load(&self.filtered) + load(&self.timed_out),
            timed_out: load(&self.timed_out),
            unknown: load(&self.unknown),
            dropped: load(&self.dropped),
            retries: load(&self.retries),
            deferrals: load(&self.deferrals),
            peak_in_flight: 0,
        }
    }
}

/// Frozen scan-wide counters.
///
/// `filtered` includes `timed_out`. Closed ports are counted even when
/// they are hidden from the per-target results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub jobs: u64,
    pub open: u64,
    pub closed: u64,
    pub filtered: u64,
    pub timed_out: u64,
    pub unknown: u64,
    pub dropped: u64,
    pub retries: u64,
    pub deferrals: u64,
    /// Most connection attempts ever in flight at once.
    pub peak_in_flight: u64,
}

impl ScanSummary {
    /// Jobs that reached any final state, including dropped ones.
    pub fn finished(&self) -> u64 {
        self.open + self.closed + self.filtered + self.unknown + self.dropped
    }
}
