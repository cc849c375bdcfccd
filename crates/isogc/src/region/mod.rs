//! Region Module - Isolated, independently collectible heap partitions
//!
//! A region is reachable only through its root ("iso") object. The root's
//! `next` link points at the region metadata object, a heap node that holds
//! the region's bookkeeping. Two kinds of region exist:
//!
//! - [`RegionTrace`]: members threaded through two rings and reclaimed by
//!   mark-and-sweep from the root
//! - [`RegionArena`]: members kept until the whole region is released
//!
//! Region Lifecycle:
//! 1. `create` - allocate the root and the metadata object
//! 2. `alloc` - add members
//! 3. `gc` - reclaim unreachable members (trace regions only)
//! 4. `merge` / `swap_root` - restructure
//! 5. `release` - free the region and every subregion it owns
//!
//! [`Region`] dispatches on the kind of the metadata object, which is how a
//! collection releases unreachable subregions of either kind.

pub mod arena;
pub mod iter;
pub mod trace;

pub use arena::RegionArena;
pub use iter::{RegionIter, RingFilter};
pub use trace::RegionTrace;

use crate::assert_context;
use crate::heap::Heap;
use crate::logging::GcEvent;
use crate::marker::ObjectStack;
use crate::object::ObjectId;
use crate::remset::{ExternalReferenceTable, RcAdjust, RememberedSet, TransferOwnership};
use crate::stats::GcCycleStats;
use serde::{Deserialize, Serialize};

/// Kind of a region metadata object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    Trace,
    Arena,
}

/// Bookkeeping shared by every region kind
#[derive(Debug, Default)]
pub struct RegionBase {
    pub(crate) remembered_set: RememberedSet,
    pub(crate) ext_refs: ExternalReferenceTable,
}

impl RegionBase {
    pub fn remembered_set(&self) -> &RememberedSet {
        &self.remembered_set
    }

    pub fn external_references(&self) -> &ExternalReferenceTable {
        &self.ext_refs
    }

    /// Absorb `other`; returns surplus reference counts to release
    pub(crate) fn merge(&mut self, other: RegionBase) -> Vec<ObjectId> {
        self.ext_refs.merge(other.ext_refs);
        self.remembered_set.merge(other.remembered_set)
    }
}

/// Body of a region metadata object
#[derive(Debug)]
pub enum RegionMeta {
    Trace(RegionTrace),
    Arena(RegionArena),
}

impl RegionMeta {
    pub fn kind(&self) -> RegionKind {
        match self {
            RegionMeta::Trace(_) => RegionKind::Trace,
            RegionMeta::Arena(_) => RegionKind::Arena,
        }
    }

    pub fn base(&self) -> &RegionBase {
        match self {
            RegionMeta::Trace(r) => &r.base,
            RegionMeta::Arena(r) => &r.base,
        }
    }

    pub(crate) fn base_mut(&mut self) -> &mut RegionBase {
        match self {
            RegionMeta::Trace(r) => &mut r.base,
            RegionMeta::Arena(r) => &mut r.base,
        }
    }
}

/// Operations on a region of any kind, addressed by its root
pub struct Region;

impl Region {
    /// Kind of the region rooted at `root`
    pub fn kind(heap: &Heap, root: ObjectId) -> RegionKind {
        let md = heap.region_of(root);
        heap.region_meta(md).kind()
    }

    /// Collect the region rooted at `root`
    ///
    /// Arena regions are never collected; `None` is returned for them.
    pub fn gc(heap: &mut Heap, root: ObjectId) -> Option<GcCycleStats> {
        match Self::kind(heap, root) {
            RegionKind::Trace => Some(RegionTrace::gc(heap, root)),
            RegionKind::Arena => {
                log::debug!("region rooted at {} is an arena, not collecting", root);
                None
            },
        }
    }

    /// Record that the region rooted at `into` references shared object `o`
    pub fn insert(heap: &mut Heap, into: ObjectId, o: ObjectId, transfer: TransferOwnership) {
        let md = heap.region_of(into);
        insert_remembered(heap, md, o, transfer);
    }

    /// Merge the region rooted at `o` into the region rooted at `into`
    ///
    /// # Panics
    ///
    /// Both regions must be of the same kind.
    pub fn merge(heap: &mut Heap, into: ObjectId, o: ObjectId) {
        match Self::kind(heap, into) {
            RegionKind::Trace => RegionTrace::merge(heap, into, o),
            RegionKind::Arena => RegionArena::merge(heap, into, o),
        }
    }

    /// Make `next` the root of the region currently rooted at `prev`
    pub fn swap_root(heap: &mut Heap, prev: ObjectId, next: ObjectId) {
        match Self::kind(heap, prev) {
            RegionKind::Trace => RegionTrace::swap_root(heap, prev, next),
            RegionKind::Arena => RegionArena::swap_root(heap, prev, next),
        }
    }

    /// Free the region rooted at `root` and every subregion it owns
    ///
    /// Subregions are released from an explicit worklist, so arbitrarily
    /// deep nesting does not grow the call stack.
    pub fn release(heap: &mut Heap, root: ObjectId) {
        let mut collect = ObjectStack::new();
        let freed = Self::release_internal(heap, root, &mut collect);
        let (subregions, sub_freed) = Self::release_subregions(heap, &mut collect);

        log::debug!(
            "released region rooted at {}: {} objects, {} subregions",
            root,
            freed + sub_freed,
            subregions
        );
        heap.emit(|| GcEvent::RegionReleased {
            root,
            objects_freed: freed + sub_freed,
            subregions_released: subregions,
        });
    }

    /// Release one region, pushing the roots of its subregions onto `collect`
    ///
    /// Returns the number of region members freed, root included.
    pub(crate) fn release_internal(
        heap: &mut Heap,
        root: ObjectId,
        collect: &mut ObjectStack,
    ) -> usize {
        match Self::kind(heap, root) {
            RegionKind::Trace => RegionTrace::release_internal(heap, root, collect),
            RegionKind::Arena => RegionArena::release_internal(heap, root, collect),
        }
    }

    /// Drain `collect`, releasing each unreachable subregion
    ///
    /// Returns (subregions released, members freed).
    pub(crate) fn release_subregions(heap: &mut Heap, collect: &mut ObjectStack) -> (usize, usize) {
        let mut regions = 0;
        let mut freed = 0;

        while let Some(root) = collect.pop() {
            assert_context!(
                heap.contains(root),
                "subregion {} is owned by more than one dead object",
                root
            );
            let kind = Self::kind(heap, root);
            log::trace!("releasing unreachable {:?} subregion {}", kind, root);

            freed += Self::release_internal(heap, root, collect);
            regions += 1;
            heap.emit(|| GcEvent::SubregionReleased { root, kind });
        }

        (regions, freed)
    }
}

/// Insert shared object `o` into the remembered set of region `md`
pub(crate) fn insert_remembered(
    heap: &mut Heap,
    md: ObjectId,
    o: ObjectId,
    transfer: TransferOwnership,
) {
    assert_context!(
        heap.class(o).is_external(),
        "{} is neither immutable nor a cown",
        o
    );

    let o = heap.immutable_root(o);
    match heap
        .region_meta_mut(md)
        .base_mut()
        .remembered_set
        .insert(o, transfer)
    {
        RcAdjust::Incref => heap.incref(o),
        RcAdjust::Decref => {
            heap.decref(o);
        },
        RcAdjust::None => {},
    }
}

/// Release the counts of remembered-set entries dropped by a region
pub(crate) fn release_counts(heap: &mut Heap, released: Vec<ObjectId>) {
    for o in released {
        heap.decref(o);
    }
}
