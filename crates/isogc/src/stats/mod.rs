//! Stats Module - Heap and Collection Statistics
//!
//! Metrics:
//! - Per-cycle collection results (`GcCycleStats`)
//! - Heap-wide allocation counters (`HeapStats`)
//! - Timing (`GcTimer`)

pub mod gc_cycle;
pub mod timer;

pub use gc_cycle::GcCycleStats;
pub use timer::GcTimer;

use serde::{Deserialize, Serialize};

/// HeapStats - snapshot of heap-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    /// Nodes allocated since creation (objects and region metadata)
    pub objects_allocated: u64,
    /// Nodes freed since creation
    pub objects_freed: u64,
    /// Size-class bytes currently handed out
    pub bytes_in_use: usize,
    /// Highest `bytes_in_use` observed
    pub peak_bytes_in_use: usize,
    /// Regions created (trace and arena)
    pub regions_created: u64,
    /// Trace region collections run
    pub collections: u64,
    /// Finalisers run
    pub finalisers_run: u64,
    /// Allocations refused for exceeding the heap budget
    pub allocation_failures: u64,
}

impl HeapStats {
    /// Nodes currently live
    pub fn live_objects(&self) -> u64 {
        self.objects_allocated - self.objects_freed
    }

    pub(crate) fn record_alloc(&mut self, bytes: usize) {
        self.objects_allocated += 1;
        self.bytes_in_use += bytes;
        self.peak_bytes_in_use = self.peak_bytes_in_use.max(self.bytes_in_use);
    }

    pub(crate) fn record_free(&mut self, bytes: usize) {
        self.objects_freed += 1;
        self.bytes_in_use -= bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_high_water_mark() {
        let mut stats = HeapStats::default();
        stats.record_alloc(64);
        stats.record_alloc(32);
        stats.record_free(64);
        assert_eq!(stats.bytes_in_use, 32);
        assert_eq!(stats.peak_bytes_in_use, 96);
        assert_eq!(stats.live_objects(), 1);
    }
}
