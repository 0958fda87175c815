//! Timing templates.
//!
//! A timing level trades speed against accuracy: higher levels allow more
//! simultaneous connection attempts and give each one less time.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// `(max_connections, timeout_seconds)` for levels 0 through 6.
const TIMING_TABLE: [(usize, u64); 7] = [
    (5, 8),
    (100, 7),
    (1000, 6),
    (2500, 5),
    (5000, 4),
    (6000, 3),
    (8000, 2),
];

/// Concurrency bound and per-attempt timeout for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingProfile {
    /// Maximum number of connection attempts in flight at once.
    pub max_connections: usize,
    /// How long a single connect may take before the port is given up on.
    pub timeout: Duration,
}

impl TimingProfile {
    /// Highest valid timing level.
    pub const MAX_LEVEL: u8 = 6;
    /// Level used when none is configured.
    pub const DEFAULT_LEVEL: u8 = 3;

    /// Look up the profile for a timing level.
    pub fn from_level(level: u8) -> ConfigResult<Self> {
        let (max_connections, timeout_secs) = TIMING_TABLE
            .get(usize::from(level))
            .copied()
            .ok_or(ConfigError::TimingOutOfRange(level))?;

        Ok(Self {
            max_connections,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// A profile outside the fixed table, for embedding and tests.
    pub fn custom(max_connections: usize, timeout: Duration) -> Self {
        Self {
            max_connections: max_connections.max(1),
            timeout,
        }
    }
}

impl Default for TimingProfile {
    fn default() -> Self {
        let (max_connections, timeout_secs) = TIMING_TABLE[usize::from(Self::DEFAULT_LEVEL)];
        Self {
            max_connections,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl fmt::Display for TimingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} connections, {:.1}s timeout",
            self.max_connections,
            self.timeout.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_table_matches() {
        let expected = [
            (0, 5, 8),
            (1, 100, 7),
            (2, 1000, 6),
            (3, 2500, 5),
            (4, 5000, 4),
            (5, 6000, 3),
            (6, 8000, 2),
        ];

        for (level, connections, secs) in expected {
            let profile = TimingProfile::from_level(level).unwrap();
            assert_eq!(profile.max_connections, connections, "level {}", level);
            assert_eq!(profile.timeout, Duration::from_secs(secs), "level {}", level);
        }
    }

    #[test]
    fn test_slowest_level() {
        let profile = TimingProfile::from_level(0).unwrap();
        assert_eq!(profile.max_connections, 5);
        assert_eq!(profile.timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_level_out_of_range() {
        assert!(matches!(
            TimingProfile::from_level(7),
            Err(ConfigError::TimingOutOfRange(7))
        ));
    }

    #[test]
    fn test_default_is_level_three() {
        assert_eq!(TimingProfile::default(), TimingProfile::from_level(3).unwrap());
    }

    #[test]
    fn test_custom_never_zero_connections() {
        assert_eq!(
            TimingProfile::custom(0, Duration::from_millis(50)).max_connections,
            1
        );
    }
}
