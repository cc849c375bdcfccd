//! Remembered Set - reference counts a region holds on shared objects
//!
//! Entries are SCC roots of immutables and cowns. Each entry stands for one
//! reference count owned by the region, plus a mark bit used during
//! collection:
//!
//! ```text
//!   insert(o, NoTransfer)   absent  -> add entry, take a new count
//!   insert(o, YesTransfer)  absent  -> add entry, adopt the caller's count
//!   insert(o, YesTransfer)  present -> drop the caller's surplus count
//!   mark(o)                         -> entry reached this cycle
//!   sweep_set(marked)               -> drop unmarked entries and their counts
//! ```

use crate::assert_context;
use crate::object::ObjectId;
use indexmap::IndexMap;

/// Whether the caller hands its own reference count to the region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOwnership {
    NoTransfer,
    YesTransfer,
}

/// Reference-count effect of an insert, applied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcAdjust {
    None,
    Incref,
    Decref,
}

/// Result of sweeping a remembered set
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Entries dropped; each carries one count to release
    pub released: Vec<ObjectId>,
    /// Entries kept and unmarked
    pub retained: usize,
}

/// Remembered set of a single region
#[derive(Debug, Default)]
pub struct RememberedSet {
    entries: IndexMap<ObjectId, bool>,
}

impl RememberedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `object` (already resolved to its SCC root)
    pub fn insert(&mut self, object: ObjectId, transfer: TransferOwnership) -> RcAdjust {
        if self.entries.contains_key(&object) {
            return match transfer {
                TransferOwnership::YesTransfer => RcAdjust::Decref,
                TransferOwnership::NoTransfer => RcAdjust::None,
            };
        }

        self.entries.insert(object, false);
        match transfer {
            TransferOwnership::NoTransfer => RcAdjust::Incref,
            TransferOwnership::YesTransfer => RcAdjust::None,
        }
    }

    /// Mark `object` as reached; bumps `marked` the first time per cycle
    ///
    /// # Panics
    ///
    /// A region that reaches a shared object it never recorded is broken.
    pub fn mark(&mut self, object: ObjectId, marked: &mut usize) {
        let entry = self.entries.get_mut(&object);
        assert_context!(
            entry.is_some(),
            "shared object {} reached but not in remembered set",
            object
        );
        if let Some(flag) = entry {
            if !*flag {
                *flag = true;
                *marked += 1;
            }
        }
    }

    /// Drop every unmarked entry and unmark the rest
    ///
    /// With `marked == 0` nothing can survive, so the whole set is drained.
    pub fn sweep_set(&mut self, marked: usize) -> SweepOutcome {
        if marked == 0 {
            return SweepOutcome {
                released: self.entries.drain(..).map(|(o, _)| o).collect(),
                retained: 0,
            };
        }

        let mut released = Vec::new();
        self.entries.retain(|object, flag| {
            if *flag {
                *flag = false;
                true
            } else {
                released.push(*object);
                false
            }
        });

        SweepOutcome {
            retained: self.entries.len(),
            released,
        }
    }

    /// Absorb `other`, transferring its counts
    ///
    /// Returns the surplus counts to release for entries present in both.
    pub fn merge(&mut self, other: RememberedSet) -> Vec<ObjectId> {
        other
            .entries
            .into_keys()
            .filter(|o| self.insert(*o, TransferOwnership::YesTransfer) == RcAdjust::Decref)
            .collect()
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.entries.contains_key(&object)
    }

    pub fn is_marked(&self, object: ObjectId) -> bool {
        self.entries.get(&object).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entries.keys().copied()
    }
}
