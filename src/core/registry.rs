//! Per-request partitioning of the configured origin list into pools.
//!
//! Pools are derived views, recomputed for every request: the serving
//! hostname is only known per-request, so self-proxy exclusion cannot be
//! cached. Partitioning is a pure function of its inputs and preserves the
//! configured origin order within each pool.
use std::sync::Arc;

use crate::core::origin::Origin;

/// The primary and backup candidate sets for a single request.
#[derive(Debug, Clone, Default)]
pub struct OriginPools {
    /// Enabled, non-backup origins eligible for this request
    pub primary: Vec<Arc<Origin>>,
    /// Enabled backup origins, tried only once the primary pool is exhausted
    pub backup: Vec<Arc<Origin>>,
}

impl OriginPools {
    /// Partition the configured origins into primary and backup pools.
    ///
    /// Filters out disabled origins and any origin whose host equals the
    /// serving hostname (case-insensitive), which would otherwise route the
    /// proxy back into itself. Origins keep their configured relative order
    /// within each pool.
    pub fn partition(origins: &[Arc<Origin>], serving_host: &str) -> Self {
        let mut pools = Self::default();

        for origin in origins {
            if !origin.is_enabled() {
                continue;
            }
            if origin.host().is_empty() || origin.host().eq_ignore_ascii_case(serving_host) {
                continue;
            }

            if origin.is_backup() {
                pools.backup.push(origin.clone());
            } else {
                pools.primary.push(origin.clone());
            }
        }

        pools
    }

    /// True when neither pool has any eligible origin.
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.backup.is_empty()
    }

    /// Total number of eligible origins across both pools.
    pub fn len(&self) -> usize {
        self.primary.len() + self.backup.len()
    }
}
