//! Scan result aggregation.
//!
//! [`ResultStore`] collects port states from many concurrent probes. It is
//! built once from the resolved targets: every target gets its own lock,
//! so writers for different targets never contend and the map itself is
//! never locked. Once the scan drains, the store is frozen into
//! [`ScanResults`] for the formatters.

use crate::config::TimingProfile;
use crate::scanner::stats::ScanSummary;
use crate::services::ServiceLookup;
use crate::types::{PortRange, Target};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// State of a scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// A service accepted the connection.
    Open,
    /// The host actively refused the connection.
    Closed,
    /// Something in the path dropped or rejected the attempt.
    Filtered,
    /// The attempt failed in a way that says nothing about the port.
    Unknown,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A port and the state it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub port: u16,
    pub state: PortState,
}

impl PortInfo {
    pub fn new(port: u16, state: PortState) -> Self {
        Self { port, state }
    }
}

struct Slot {
    target: Arc<Target>,
    ports: Mutex<Vec<PortInfo>>,
}

/// Thread-safe, per-target port state accumulator.
pub struct ResultStore {
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
}

impl ResultStore {
    /// Seed an empty entry for every target.
    ///
    /// Targets sharing a display name collapse into the first one.
    pub fn new(targets: &[Arc<Target>]) -> Self {
        let mut slots = Vec::with_capacity(targets.len());
        let mut index = HashMap::with_capacity(targets.len());

        for target in targets {
            if index.contains_key(target.name()) {
                continue;
            }
            index.insert(target.name().to_string(), slots.len());
            slots.push(Slot {
                target: Arc::clone(target),
                ports: Mutex::new(Vec::new()),
            });
        }

        Self { slots, index }
    }

    /// Record `state` for `port` on the target named `target`.
    ///
    /// Returns `true` if the entry was added. A port that is already
    /// recorded for the target is left untouched, as is any update for a
    /// target the store was not seeded with.
    pub fn update(&self, target: &str, port: u16, state: PortState) -> bool {
        let Some(&i) = self.index.get(target) else {
            return false;
        };

        let mut ports = self.slots[i]
            .ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if ports.iter().any(|info| info.port == port) {
            return false;
        }
        ports.push(PortInfo::new(port, state));
        true
    }

    /// Snapshot of the ports recorded so far for a target, in insertion
    /// order.
    pub fn ports(&self, target: &str) -> Option<Vec<PortInfo>> {
        let &i = self.index.get(target)?;
        Some(
            self.slots[i]
                .ports
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        )
    }

    /// Produce per-target reports, ports sorted ascending, with service
    /// names filled in from `services`.
    pub fn freeze(&self, services: &dyn ServiceLookup) -> Vec<TargetReport> {
        self.slots
            .iter()
            .map(|slot| {
                let mut ports = slot
                    .ports
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                ports.sort_by_key(|info| info.port);

                TargetReport {
                    target: slot.target.name().to_string(),
                    ip_address: slot.target.addr().to_string(),
                    ports: ports
                        .into_iter()
                        .map(|info| PortReport {
                            port: info.port,
                            state: info.state,
                            service: services.describe(info.port).to_string(),
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

/// A recorded port as handed to the formatters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortReport {
    pub port: u16,
    pub state: PortState,
    /// Best-effort guess from the well-known port table.
    pub service: String,
}

/// All recorded ports of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    /// Display name (hostname or literal address).
    pub target: String,
    pub ip_address: String,
    /// Ports sorted ascending.
    pub ports: Vec<PortReport>,
}

impl TargetReport {
    /// Count recorded ports in a given state.
    pub fn count(&self, state: PortState) -> usize {
        self.ports.iter().filter(|p| p.state == state).count()
    }
}

/// Complete, frozen scan results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResults {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub timing: TimingProfile,
    pub ports: PortRange,
    pub show_closed: bool,
    pub summary: ScanSummary,
    pub targets: Vec<TargetReport>,
    /// Host tokens that could not be resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolution_errors: Vec<String>,
}

impl ScanResults {
    /// Look up the report for a target display name.
    pub fn target(&self, name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.target == name)
    }
}
