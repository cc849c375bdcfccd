//! Test Utilities for the isogc Region Test Suite
//!
//! Every helper asserts strictly: a region either satisfies its ring
//! invariants exactly or the test fails.
//!
//! ============================================================================
//! These utilities are designed to FIND BUGS in ring maintenance, not to
//! paper over them.
//! ============================================================================

#![allow(dead_code)]

use isogc::{
    Class, Descriptor, GcConfig, GcCycleStats, GcEvent, GcLogger, GcLoggerConfig, Heap, ObjectId,
    RegionTrace, RingFilter,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// ============================================================================
/// DESCRIPTORS
/// ============================================================================

/// Finaliser that requires every field target to still be alive
///
/// Finalisers run before any member swept in the same cycle is freed.
pub fn fields_must_be_alive(heap: &Heap, object: ObjectId) {
    for field in heap.fields(object).iter().flatten() {
        assert!(
            heap.contains(*field),
            "finaliser of {} saw freed field target {}",
            object,
            field
        );
    }
}

/// Plain member: no finaliser, cannot own subregions
pub static NODE: Descriptor = Descriptor::new("node", 32, 2);

/// Plain member with a larger footprint
pub static BIG: Descriptor = Descriptor::new("big", 100, 2);

/// Member with a finaliser
pub static FINAL: Descriptor = Descriptor::new("final", 48, 2).with_finaliser(fields_must_be_alive);

/// Member that may own subregions
pub static OWNER: Descriptor = Descriptor::new("owner", 32, 2).with_iso_fields();

/// Immutable or cown payload
pub static SHARED: Descriptor = Descriptor::new("shared", 16, 1);

/// ============================================================================
/// REGION FIXTURE
/// ============================================================================

/// Heap with a recording logger attached
pub struct RegionFixture {
    pub heap: Heap,
    pub logger: Arc<GcLogger>,
}

impl RegionFixture {
    /// Create fixture with default configuration
    ///
    /// **Bug this finds:** Configuration validation bugs, sink wiring
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    pub fn with_config(config: GcConfig) -> Self {
        let logger = Arc::new(GcLogger::new(GcLoggerConfig::recording()));
        let heap = Heap::with_sink(config, logger.clone())
            .expect("heap initialization should succeed with valid config");
        Self { heap, logger }
    }

    /// Create a trace region and return its root
    pub fn region(&mut self, descriptor: &'static Descriptor) -> ObjectId {
        RegionTrace::create(&mut self.heap, descriptor)
            .unwrap_or_else(|e| panic!("region creation failed: {}", e))
    }

    /// Allocate a member of the region rooted at `root`
    pub fn alloc(&mut self, root: ObjectId, descriptor: &'static Descriptor) -> ObjectId {
        RegionTrace::alloc(&mut self.heap, root, descriptor)
            .unwrap_or_else(|e| panic!("allocation in {} failed: {}", root, e))
    }

    /// Point field `index` of `from` at `to`
    pub fn link(&mut self, from: ObjectId, index: usize, to: ObjectId) {
        self.heap
            .set_field(from, index, Some(to))
            .unwrap_or_else(|e| panic!("link {} -> {} failed: {}", from, to, e));
    }

    /// Clear field `index` of `from`
    pub fn unlink(&mut self, from: ObjectId, index: usize) {
        self.heap
            .set_field(from, index, None)
            .unwrap_or_else(|e| panic!("unlink {} failed: {}", from, e));
    }

    /// Collect and check every ring invariant afterwards
    pub fn gc(&mut self, root: ObjectId) -> GcCycleStats {
        let stats = RegionTrace::gc(&mut self.heap, root);
        assert_region_invariants(&self.heap, root);
        stats
    }

    /// Members of the region, primary ring then secondary ring
    pub fn members(&self, root: ObjectId) -> Vec<ObjectId> {
        RegionTrace::iter(&self.heap, root, RingFilter::Both).collect()
    }

    pub fn live_set(&self, root: ObjectId) -> BTreeSet<ObjectId> {
        self.members(root).into_iter().collect()
    }

    pub fn memory_used(&self, root: ObjectId) -> usize {
        RegionTrace::get(&self.heap, root).memory_used()
    }

    /// How often the finaliser of `object` ran
    pub fn finalised_count(&self, object: ObjectId) -> usize {
        self.logger
            .finalised()
            .into_iter()
            .filter(|o| *o == object)
            .count()
    }

    /// Position of the first recorded event matching `pred`
    pub fn event_index(&self, pred: impl Fn(&GcEvent) -> bool) -> Option<usize> {
        self.logger.events().iter().position(pred)
    }

    /// Position of the deallocation of `object`
    pub fn dealloc_index(&self, object: ObjectId) -> Option<usize> {
        self.event_index(|e| matches!(e, GcEvent::Deallocated { object: o, .. } if *o == object))
    }

    /// Position of the finalisation of `object`
    pub fn finalise_index(&self, object: ObjectId) -> Option<usize> {
        self.event_index(|e| matches!(e, GcEvent::Finalised { object: o, .. } if *o == object))
    }
}

/// ============================================================================
/// REFERENCE REACHABILITY
/// ============================================================================

/// Region members reachable from `root`, computed independently of the collector
///
/// Stops at subregion roots and shared objects.
pub fn reachable(heap: &Heap, root: ObjectId) -> BTreeSet<ObjectId> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![root];
    seen.insert(root);

    while let Some(o) = stack.pop() {
        for &field in heap.fields(o).iter().flatten() {
            if heap.class(field).is_mutable() && seen.insert(field) {
                stack.push(field);
            }
        }
    }
    seen
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

/// Assert that the rings partition the region by finaliser need
///
/// **Bug this finds:** Members appended to the wrong ring, ring corruption
/// after merge or root swap, lost secondary tail
/// **Tolerance:** ZERO - a misplaced member is never finalised correctly
#[track_caller]
pub fn assert_ring_partition(heap: &Heap, root: ObjectId) {
    let root_need = heap.needs_finaliser_ring(root);
    let both: Vec<_> = RegionTrace::iter(heap, root, RingFilter::Both).collect();
    let needs: Vec<_> = RegionTrace::iter(heap, root, RingFilter::NeedsFinaliser).collect();
    let plain: Vec<_> = RegionTrace::iter(heap, root, RingFilter::NoFinaliser).collect();

    let unique: BTreeSet<_> = both.iter().copied().collect();
    assert_eq!(unique.len(), both.len(), "a member appears twice in the rings");
    assert_eq!(needs.len() + plain.len(), both.len(), "filters do not partition the rings");

    for o in &needs {
        assert!(heap.needs_finaliser_ring(*o), "{} in finaliser ring without need", o);
    }
    for o in &plain {
        assert!(!heap.needs_finaliser_ring(*o), "{} outside finaliser ring with need", o);
    }

    // The primary ring is the one holding the root, and the root is its tail.
    let primary = if root_need { &needs } else { &plain };
    assert_eq!(primary.last(), Some(&root), "root is not the primary ring tail");
    assert_eq!(both.iter().filter(|o| **o == root).count(), 1);
}

/// Assert that the root is the only iso and nobody is left marked
///
/// **Bug this finds:** Sweep not unmarking survivors, stale iso after merge
#[track_caller]
pub fn assert_classes(heap: &Heap, root: ObjectId) {
    for o in RegionTrace::iter(heap, root, RingFilter::Both) {
        let expected = if o == root { Class::Iso } else { Class::Unmarked };
        assert_eq!(heap.class(o), expected, "member {} has wrong class", o);
    }
}

/// Assert that `memory_used` is the sum of member sizes
///
/// **Bug this finds:** Accounting drift in alloc, sweep or merge
#[track_caller]
pub fn assert_memory_consistent(heap: &Heap, root: ObjectId) {
    let sum: usize = RegionTrace::iter(heap, root, RingFilter::Both)
        .map(|o| heap.size(o))
        .sum();
    assert_eq!(
        RegionTrace::get(heap, root).memory_used(),
        sum,
        "memory_used differs from member sizes"
    );
}

#[track_caller]
pub fn assert_region_invariants(heap: &Heap, root: ObjectId) {
    assert_ring_partition(heap, root);
    assert_classes(heap, root);
    assert_memory_consistent(heap, root);
}

#[track_caller]
pub fn assert_all_alive(heap: &Heap, objects: &[ObjectId]) {
    for o in objects {
        assert!(heap.contains(*o), "{} was freed but should be alive", o);
    }
}

#[track_caller]
pub fn assert_all_freed(heap: &Heap, objects: &[ObjectId]) {
    for o in objects {
        assert!(!heap.contains(*o), "{} is alive but should be freed", o);
    }
}
