//! Write durability for the transactional table store
//!
//! Defines when committed table writes reach stable storage.

use std::time::Duration;

/// Durability mode for table writes.
///
/// Controls whether every commit is synced or whether syncing is left to a
/// background flush task, trading a bounded loss window for write latency.
///
/// # Mode Comparison
///
/// | Mode | Commit cost | Loss window on crash |
/// |------|-------------|----------------------|
/// | Immediate | fsync per write | none |
/// | Deferred | no fsync | up to `interval` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDurability {
    /// Sync on every commit.
    Immediate,

    /// Commit without syncing; a background task syncs every `interval`.
    Deferred {
        /// Time between background syncs
        interval: Duration,
    },
}

impl WriteDurability {
    /// Derive the mode from a configured flush interval.
    ///
    /// A zero interval selects [`WriteDurability::Immediate`].
    pub fn from_interval(interval: Duration) -> Self {
        if interval.is_zero() {
            WriteDurability::Immediate
        } else {
            WriteDurability::Deferred { interval }
        }
    }

    /// Interval of the background flush task, if one is needed.
    pub fn flush_interval(&self) -> Option<Duration> {
        match self {
            WriteDurability::Immediate => None,
            WriteDurability::Deferred { interval } => Some(*interval),
        }
    }

    /// Check if every commit is synced.
    pub fn requires_immediate_sync(&self) -> bool {
        matches!(self, WriteDurability::Immediate)
    }

    /// Human-readable description of the mode.
    pub fn description(&self) -> &'static str {
        match self {
            WriteDurability::Immediate => "Sync per commit (safest, slowest)",
            WriteDurability::Deferred { .. } => "Deferred sync (bounded loss window)",
        }
    }

    pub(crate) fn commit_durability(&self) -> redb::Durability {
        match self {
            WriteDurability::Immediate => redb::Durability::Immediate,
            WriteDurability::Deferred { .. } => redb::Durability::None,
        }
    }
}

impl Default for WriteDurability {
    fn default() -> Self {
        WriteDurability::Deferred {
            interval: Duration::from_secs(3),
        }
    }
}
