//! GC Cycle Statistics
//!
//! One `GcCycleStats` is produced by every trace-region collection and
//! carried in the `CycleEnd` event.

use crate::object::ObjectId;
use serde::{Deserialize, Serialize};

/// Statistics for a single region collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcCycleStats {
    /// Region metadata object that was collected
    pub region: Option<ObjectId>,
    /// Root the collection started from
    pub root: Option<ObjectId>,

    /// Objects that went from `Unmarked` to `Marked`
    pub objects_marked: usize,
    /// Region members freed by the sweep (root excluded)
    pub objects_swept: usize,
    /// Finalisers run during the sweep and subregion release
    pub finalisers_run: usize,

    /// `current_memory_used` before the sweep
    pub bytes_before: usize,
    /// `current_memory_used` after the sweep
    pub bytes_after: usize,

    /// Unreachable subregions released after the sweep
    pub subregions_released: usize,
    /// Objects freed while releasing those subregions
    pub subregion_objects_freed: usize,

    /// Remembered-set entries reached this cycle
    pub remset_marked: usize,
    /// Remembered-set entries dropped this cycle
    pub remset_pruned: usize,

    /// Wall-clock duration, 0 when statistics are disabled
    pub duration_ns: u64,
}

impl GcCycleStats {
    pub fn new(region: ObjectId, root: ObjectId) -> Self {
        Self {
            region: Some(region),
            root: Some(root),
            ..Default::default()
        }
    }

    /// Bytes of region members reclaimed by the sweep
    pub fn bytes_reclaimed(&self) -> usize {
        self.bytes_before.saturating_sub(self.bytes_after)
    }

    /// True when the cycle freed nothing at all
    pub fn is_noop(&self) -> bool {
        self.objects_swept == 0 && self.subregions_released == 0 && self.remset_pruned == 0
    }
}
