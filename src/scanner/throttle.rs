//! Admission control for connection attempts.
//!
//! A single atomic counter tracks how many connects are in flight. A probe
//! must take a slot before connecting; when none is free it is not queued
//! but deferred by the caller and tried again later.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Bounded in-flight counter shared by every probe of a scan.
#[derive(Debug)]
pub struct Throttle {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    max_connections: usize,
}

impl Throttle {
    /// Create a throttle allowing `max_connections` simultaneous attempts.
    pub fn new(max_connections: usize) -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            max_connections: max_connections.max(1),
        })
    }

    /// Take a slot if one is free.
    ///
    /// The counter is only incremented when the result stays within the
    /// bound, so it is never observed above `max_connections`.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ThrottlePermit> {
        let prev = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_connections).then_some(n + 1)
            })
            .ok()?;

        self.peak.fetch_max(prev + 1, Ordering::Relaxed);

        Some(ThrottlePermit {
            throttle: Arc::clone(self),
            released: AtomicBool::new(false),
        })
    }

    /// Attempts currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Highest number of simultaneous attempts seen so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

/// A held throttle slot.
///
/// Whichever path finishes the attempt first releases the slot; later
/// releases, including the one on drop, do nothing.
#[derive(Debug)]
pub struct ThrottlePermit {
    throttle: Arc<Throttle>,
    released: AtomicBool,
}

impl ThrottlePermit {
    /// Give the slot back. Returns `true` only for the call that actually
    /// released it.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.throttle.in_flight.fetch_sub(1, Ordering::AcqRel);
        true
    }
}

impl Drop for ThrottlePermit {
    fn drop(&mut self) {
        self.release();
    }
}
