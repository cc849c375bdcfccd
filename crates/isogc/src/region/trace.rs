//! Trace Region - mark-and-sweep collected region
//!
//! Every member of a trace region has a `next` link to another member,
//! forming circular lists ("rings") that are unrelated to the object graph.
//! The region metadata object closes both rings:
//!
//! ```text
//!                         |
//!                         v
//!                  iso (root) object
//!                  ^              \
//!                 /                v
//!            object_n           RegionTrace ──── next_not_root ──┐
//!               |               metadata                         v
//!              ...                 |                        secondary ring
//!                \                 v                             |
//!                 └── ... ──── object_1                    last_not_root
//!                                                                |
//!                                              (back to metadata)┘
//! ```
//!
//! The primary ring holds members whose finaliser-ring need matches the
//! root's, and always ends with the root. The secondary ring holds the
//! rest, with a last pointer so that two rings splice in constant time.
//! A member needs the finaliser ring when its type has a finaliser or may
//! own subregions; only dead members of that ring are scanned for iso
//! fields, and their memory is freed after the whole ring has been swept so
//! finalisers can still read their dead siblings.

use super::iter::{RegionIter, RingFilter};
use super::{insert_remembered, release_counts, Region, RegionBase, RegionKind, RegionMeta};
use crate::assert_context;
use crate::error::Result;
use crate::heap::Heap;
use crate::logging::GcEvent;
use crate::marker::ObjectStack;
use crate::object::{Class, Descriptor, Object, ObjectId};
use crate::remset::{ExternalRef, ExternalReferenceTable, RememberedSet, TransferOwnership};
use crate::stats::{GcCycleStats, GcTimer};
use crate::util::{size_to_sizeclass, sizeclass_to_size, SizeClass};

/// Descriptor of trace region metadata objects
pub(crate) static TRACE_DESCRIPTOR: Descriptor =
    Descriptor::new("RegionTrace", std::mem::size_of::<RegionTrace>(), 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RingKind {
    Finaliser,
    Nonfinaliser,
}

/// Metadata of a trace region
#[derive(Debug)]
pub struct RegionTrace {
    /// Head of the secondary ring; the metadata object itself when empty
    pub(crate) next_not_root: ObjectId,
    /// Tail of the secondary ring; the metadata object itself when empty
    pub(crate) last_not_root: ObjectId,

    /// Bytes of live members, root included
    current_memory_used: usize,
    /// `current_memory_used` after the previous sweep, quantized
    previous_memory_used: SizeClass,

    pub(crate) base: RegionBase,
}

impl RegionTrace {
    fn new(md: ObjectId) -> Self {
        Self {
            next_not_root: md,
            last_not_root: md,
            current_memory_used: 0,
            previous_memory_used: SizeClass::ZERO,
            base: RegionBase::default(),
        }
    }

    // === Public API ===

    /// Create a trace region whose root is a new object of type `descriptor`
    ///
    /// Returns the root.
    pub fn create(heap: &mut Heap, descriptor: &'static Descriptor) -> Result<ObjectId> {
        let root = heap.alloc(descriptor)?;
        let md = match heap.alloc_with(&TRACE_DESCRIPTOR, |md| {
            let mut object = Object::with_region(
                &TRACE_DESCRIPTOR,
                RegionMeta::Trace(RegionTrace::new(md)),
            );
            object.header.init_next(root);
            object
        }) {
            Ok(md) => md,
            Err(err) => {
                heap.dealloc(root);
                return Err(err);
            },
        };

        heap.init_iso(root, md);
        Self::meta_mut(heap, md).use_memory(descriptor.size);
        heap.stats_mut().regions_created += 1;

        log::debug!("trace region {} created with root {}", md, root);
        heap.emit(|| GcEvent::RegionCreated {
            region: md,
            root,
            kind: RegionKind::Trace,
        });
        Ok(root)
    }

    /// Allocate an object of type `descriptor` in the region rooted at `root`
    pub fn alloc(
        heap: &mut Heap,
        root: ObjectId,
        descriptor: &'static Descriptor,
    ) -> Result<ObjectId> {
        let md = Self::region(heap, root);
        let o = heap.alloc(descriptor)?;

        Self::append(heap, md, o, o);
        Self::meta_mut(heap, md).use_memory(descriptor.size);
        Ok(o)
    }

    /// Record shared object `o` in the remembered set of `into`'s region
    ///
    /// With `YesTransfer` the caller's reference count moves to the region.
    pub fn insert(heap: &mut Heap, into: ObjectId, o: ObjectId, transfer: TransferOwnership) {
        let md = Self::region(heap, into);
        insert_remembered(heap, md, o, transfer);
    }

    /// Merge the region rooted at `o` into the region rooted at `into`
    ///
    /// `o` stops being a root and becomes an ordinary member.
    ///
    /// # Panics
    ///
    /// `o` must root a different trace region.
    pub fn merge(heap: &mut Heap, into: ObjectId, o: ObjectId) {
        assert_context!(
            heap.class(o) == Class::Iso,
            "{} is not the root of a region",
            o
        );
        let md = Self::region(heap, into);
        let other = heap.region_of(o);
        assert_context!(md != other, "cannot merge region {} into itself", md);
        assert_context!(
            Self::is_trace_region(heap, other),
            "cannot merge {:?} region {} into trace region {}",
            heap.region_meta(other).kind(),
            other,
            md
        );

        let bytes = Self::merge_internal(heap, md, o, other);

        let absorbed = std::mem::take(&mut Self::meta_mut(heap, other).base);
        let surplus = Self::meta_mut(heap, md).base.merge(absorbed);
        release_counts(heap, surplus);

        heap.dealloc(other);

        log::debug!("merged region of {} into region {} ({} bytes)", o, md, bytes);
        heap.emit(|| GcEvent::Merged {
            into,
            absorbed: o,
            bytes,
        });
    }

    /// Make `next` the root of the region currently rooted at `prev`
    ///
    /// # Panics
    ///
    /// `next` must be a member of `prev`'s region other than `prev`.
    pub fn swap_root(heap: &mut Heap, prev: ObjectId, next: ObjectId) {
        assert_context!(prev != next, "{} is already the root", prev);
        let md = Self::region(heap, prev);
        assert_context!(md != next, "{} is a region metadata object", next);
        assert_context!(
            heap.class(next).is_mutable(),
            "{} is not a mutable region member",
            next
        );
        if cfg!(debug_assertions) {
            assert_context!(
                Self::debug_is_in_region(heap, prev, next),
                "{} is not a member of region {}",
                next,
                md
            );
        }

        let rings_swapped = Self::swap_root_internal(heap, md, prev, next);

        log::debug!("region {} root {} -> {}", md, prev, next);
        heap.emit(|| GcEvent::RootSwapped {
            region: md,
            old_root: prev,
            new_root: next,
            rings_swapped,
        });
    }

    /// Collect the region rooted at `root`
    ///
    /// Marks from the root, sweeps both rings, then releases every subregion
    /// owned by a dead member.
    pub fn gc(heap: &mut Heap, root: ObjectId) -> GcCycleStats {
        let md = Self::region(heap, root);
        let timer = GcTimer::start_if(heap.config().stats_enabled);
        let finalisers_before = heap.stats().finalisers_run;

        let mut stats = GcCycleStats::new(md, root);
        stats.bytes_before = Self::meta(heap, md).current_memory_used;

        log::debug!("region {} collection started from {}", md, root);
        heap.emit(|| GcEvent::CycleStart {
            region: md,
            root,
            bytes: stats.bytes_before,
        });

        let mut collect = ObjectStack::new();
        let marked = Self::mark(heap, md, root, &mut stats);
        Self::sweep(heap, md, root, &mut collect, marked, &mut stats);
        stats.bytes_after = Self::meta(heap, md).current_memory_used;

        let (subregions, freed) = Region::release_subregions(heap, &mut collect);
        stats.subregions_released = subregions;
        stats.subregion_objects_freed = freed;
        stats.finalisers_run = (heap.stats().finalisers_run - finalisers_before) as usize;
        stats.duration_ns = timer.elapsed_ns();
        heap.stats_mut().collections += 1;

        if heap.config().verbose {
            log::info!(
                "region {}: marked {}, swept {}, {} -> {} bytes, {} subregions released",
                md,
                stats.objects_marked,
                stats.objects_swept,
                stats.bytes_before,
                stats.bytes_after,
                stats.subregions_released
            );
        } else {
            log::debug!(
                "region {} collection completed, {} bytes reclaimed",
                md,
                stats.bytes_reclaimed()
            );
        }
        heap.emit(|| GcEvent::CycleEnd {
            stats: stats.clone(),
        });

        stats
    }

    /// Iterate the members of the region rooted at `root`
    pub fn iter(heap: &Heap, root: ObjectId, filter: RingFilter) -> RegionIter<'_> {
        let md = Self::region(heap, root);
        RegionIter::new(heap, md, filter)
    }

    /// Metadata of the trace region rooted at `root`
    pub fn get(heap: &Heap, root: ObjectId) -> &RegionTrace {
        let md = Self::region(heap, root);
        Self::meta(heap, md)
    }

    /// `md` is a live trace region metadata object
    pub fn is_trace_region(heap: &Heap, md: ObjectId) -> bool {
        matches!(
            heap.get(md).and_then(Object::region_meta),
            Some(RegionMeta::Trace(_))
        )
    }

    /// Caller-side collection heuristic for the region rooted at `root`
    pub fn should_collect(heap: &Heap, root: ObjectId) -> bool {
        let reg = Self::get(heap, root);
        heap.config()
            .should_collect(reg.current_memory_used, reg.previous_memory_used)
    }

    /// Hand out a weak handle to member `o` of the region rooted at `root`
    ///
    /// Asking twice for the same member returns the same handle.
    pub fn create_external_reference(heap: &mut Heap, root: ObjectId, o: ObjectId) -> ExternalRef {
        let md = Self::region(heap, root);
        if cfg!(debug_assertions) {
            assert_context!(
                Self::debug_is_in_region(heap, root, o),
                "{} is not a member of region {}",
                o,
                md
            );
        }

        if let Some(existing) = Self::meta(heap, md).base.ext_refs.get(o) {
            return existing;
        }

        let handle = ExternalRef::new(o, heap.next_ext_ref_id());
        heap.set_ext_ref(o, true);
        Self::meta_mut(heap, md).base.ext_refs.insert(handle);
        handle
    }

    /// Target of `handle` if it is still a live member of `root`'s region
    pub fn resolve_external_reference(
        heap: &Heap,
        root: ObjectId,
        handle: &ExternalRef,
    ) -> Option<ObjectId> {
        let md = Self::region(heap, root);
        if !heap.contains(handle.target()) {
            return None;
        }
        Self::meta(heap, md).base.ext_refs.resolve(handle)
    }

    /// Linear membership check
    pub fn debug_is_in_region(heap: &Heap, root: ObjectId, o: ObjectId) -> bool {
        Self::iter(heap, root, RingFilter::Both).any(|p| p == o)
    }

    /// Bytes of live members, root included
    pub fn memory_used(&self) -> usize {
        self.current_memory_used
    }

    /// Live bytes after the previous sweep, as a size class
    pub fn previous_memory_used(&self) -> SizeClass {
        self.previous_memory_used
    }

    pub fn remembered_set(&self) -> &RememberedSet {
        &self.base.remembered_set
    }

    pub fn external_references(&self) -> &ExternalReferenceTable {
        &self.base.ext_refs
    }

    // === Lookup ===

    /// Metadata object of the trace region rooted at `root`
    fn region(heap: &Heap, root: ObjectId) -> ObjectId {
        let md = heap.region_of(root);
        assert_context!(
            Self::is_trace_region(heap, md),
            "{} is not the root of a trace region",
            root
        );
        md
    }

    pub(crate) fn meta(heap: &Heap, md: ObjectId) -> &RegionTrace {
        match heap.region_meta(md) {
            RegionMeta::Trace(reg) => reg,
            RegionMeta::Arena(_) => panic!("Assertion failed at trace region: {} is an arena", md),
        }
    }

    fn meta_mut(heap: &mut Heap, md: ObjectId) -> &mut RegionTrace {
        match heap.region_meta_mut(md) {
            RegionMeta::Trace(reg) => reg,
            RegionMeta::Arena(_) => panic!("Assertion failed at trace region: {} is an arena", md),
        }
    }

    // === Rings ===

    /// Insert the chain `hd ..= tl` right after the metadata object
    ///
    /// The chain joins the primary ring when `hd` has the same finaliser-ring
    /// need as the primary ring's head, the secondary ring otherwise. The
    /// tail's class is reset, so a merged-in root stops being an iso.
    fn append(heap: &mut Heap, md: ObjectId, hd: ObjectId, tl: ObjectId) {
        let p = heap.next(md);

        if heap.needs_finaliser_ring(hd) == heap.needs_finaliser_ring(p) {
            heap.init_next(tl, p);
            heap.set_next(md, hd);
        } else {
            let reg = Self::meta_mut(heap, md);
            let next_not_root = reg.next_not_root;
            reg.next_not_root = hd;
            if reg.last_not_root == md {
                reg.last_not_root = tl;
            }
            heap.init_next(tl, next_not_root);
        }
    }

    /// Splice both rings of region `other` (rooted at `o`) into region `md`
    ///
    /// Returns the bytes taken over.
    fn merge_internal(heap: &mut Heap, md: ObjectId, o: ObjectId, other: ObjectId) -> usize {
        let head = heap.next(other);
        let (next_not_root, last_not_root, current, previous) = {
            let reg = Self::meta(heap, other);
            (
                reg.next_not_root,
                reg.last_not_root,
                reg.current_memory_used,
                reg.previous_memory_used,
            )
        };

        if head != other {
            Self::append(heap, md, head, o);
        }
        if next_not_root != other {
            Self::append(heap, md, next_not_root, last_not_root);
        }

        let reg = Self::meta_mut(heap, md);
        reg.current_memory_used += current;
        reg.previous_memory_used = size_to_sizeclass(
            sizeclass_to_size(reg.previous_memory_used).saturating_add(sizeclass_to_size(previous)),
        );
        current
    }

    /// Returns whether the rings had to be swapped
    fn swap_root_internal(heap: &mut Heap, md: ObjectId, prev: ObjectId, next: ObjectId) -> bool {
        let mut oroot = prev;
        let rings_swapped = heap.needs_finaliser_ring(prev) != heap.needs_finaliser_ring(next);

        if rings_swapped {
            let (next_not_root, last_not_root) = {
                let reg = Self::meta(heap, md);
                (reg.next_not_root, reg.last_not_root)
            };
            assert_context!(
                heap.next(last_not_root) == md,
                "secondary ring of region {} is not closed",
                md
            );

            let head = heap.next(md);
            heap.set_next(md, next_not_root);

            let reg = Self::meta_mut(heap, md);
            reg.next_not_root = head;
            reg.last_not_root = prev;
            heap.init_next(prev, md);
            oroot = last_not_root;
        }

        // After a ring swap the new root may already be the primary tail.
        if oroot != next {
            assert_context!(heap.next(oroot) == md, "{} is not the primary tail", oroot);
            assert_context!(heap.next(next) != md, "{} is already a ring tail", next);

            let x = heap.next(md);
            let y = heap.next(next);
            heap.init_next(oroot, x);
            heap.set_next(md, y);
        }

        heap.init_iso(next, md);
        rings_swapped
    }

    // === Collection ===

    /// Mark everything reachable from `root` without entering subregions
    ///
    /// Returns the number of remembered-set entries reached.
    fn mark(heap: &mut Heap, md: ObjectId, root: ObjectId, stats: &mut GcCycleStats) -> usize {
        let mut dfs = ObjectStack::new();
        let mut marked = 0;
        heap.trace(root, &mut dfs);

        while let Some(p) = dfs.pop() {
            match heap.class(p) {
                Class::Iso | Class::Marked => {},
                Class::Unmarked => {
                    heap.mark(p);
                    heap.trace(p, &mut dfs);
                    stats.objects_marked += 1;
                },
                Class::SccPtr => {
                    let scc = heap.immutable_root(p);
                    Self::meta_mut(heap, md)
                        .base
                        .remembered_set
                        .mark(scc, &mut marked);
                },
                Class::Rc | Class::Cown => {
                    Self::meta_mut(heap, md)
                        .base
                        .remembered_set
                        .mark(p, &mut marked);
                },
            }
        }

        marked
    }

    /// Free every unmarked member; subregions of dead members go to `collect`
    fn sweep(
        heap: &mut Heap,
        md: ObjectId,
        root: ObjectId,
        collect: &mut ObjectStack,
        marked: usize,
        stats: &mut GcCycleStats,
    ) {
        Self::meta_mut(heap, md).current_memory_used = 0;
        Self::sweep_ring(heap, md, root, RingKind::Finaliser, collect, stats);
        Self::sweep_ring(heap, md, root, RingKind::Nonfinaliser, collect, stats);

        let outcome = Self::meta_mut(heap, md).base.remembered_set.sweep_set(marked);
        stats.remset_marked = marked;
        stats.remset_pruned = outcome.released.len();
        release_counts(heap, outcome.released);

        let reg = Self::meta_mut(heap, md);
        reg.previous_memory_used = size_to_sizeclass(reg.current_memory_used);
    }

    fn sweep_ring(
        heap: &mut Heap,
        md: ObjectId,
        root: ObjectId,
        ring: RingKind,
        collect: &mut ObjectStack,
        stats: &mut GcCycleStats,
    ) {
        let in_secondary_ring = match ring {
            RingKind::Finaliser => !heap.needs_finaliser_ring(root),
            RingKind::Nonfinaliser => heap.needs_finaliser_ring(root),
        };

        let mut prev = md;
        let mut p = if in_secondary_ring {
            Self::meta(heap, md).next_not_root
        } else {
            heap.next(md)
        };
        // Finaliser-ring members are freed after the walk.
        let mut deferred = Vec::new();

        while p != md {
            match heap.class(p) {
                Class::Iso => {
                    // The root is always the last member of the primary ring.
                    assert_context!(p == root, "foreign iso {} inside region {}", p, md);
                    assert_context!(heap.next(p) == md, "root {} is not the ring tail", p);
                    let size = heap.size(p);
                    Self::meta_mut(heap, md).use_memory(size);
                    p = md;
                },
                Class::Marked => {
                    let size = heap.size(p);
                    Self::meta_mut(heap, md).use_memory(size);
                    heap.unmark(p);
                    prev = p;
                    p = heap.next(p);
                },
                Class::Unmarked => {
                    let q = heap.next(p);

                    match ring {
                        RingKind::Finaliser => {
                            heap.find_iso_fields(p, root, collect);
                            heap.finalise(p);
                            deferred.push(p);
                        },
                        RingKind::Nonfinaliser => {
                            if let Some(sub) = heap.foreign_iso_field(p, root) {
                                panic!(
                                    "Assertion failed at sweep: {} holds subregion {} but is outside the finaliser ring",
                                    p, sub
                                );
                            }
                            Self::erase_ext_ref(heap, md, p);
                            heap.dealloc(p);
                        },
                    }
                    stats.objects_swept += 1;

                    if prev == md && in_secondary_ring {
                        Self::meta_mut(heap, md).next_not_root = q;
                    } else {
                        heap.set_next(prev, q);
                    }

                    let reg = Self::meta_mut(heap, md);
                    if in_secondary_ring && reg.last_not_root == p {
                        reg.last_not_root = prev;
                    }

                    p = q;
                },
                class => panic!(
                    "Assertion failed at sweep: {} of class {:?} inside region {}",
                    p, class, md
                ),
            }
        }

        for p in deferred {
            Self::erase_ext_ref(heap, md, p);
            heap.dealloc(p);
        }
    }

    /// Free the whole region rooted at `root`
    ///
    /// Subregions are only pushed onto `collect`. Returns the number of
    /// members freed, root included.
    pub(crate) fn release_internal(
        heap: &mut Heap,
        root: ObjectId,
        collect: &mut ObjectStack,
    ) -> usize {
        let md = Self::region(heap, root);
        log::trace!("releasing trace region {} rooted at {}", md, root);

        heap.find_iso_fields(root, root, collect);
        heap.finalise(root);

        let mut stats = GcCycleStats::new(md, root);
        Self::sweep(heap, md, root, collect, 0, &mut stats);

        heap.dealloc(md);
        // The sweep leaves the root alone.
        heap.dealloc(root);
        stats.objects_swept + 1
    }

    fn erase_ext_ref(heap: &mut Heap, md: ObjectId, p: ObjectId) {
        if heap.has_ext_ref(p) {
            Self::meta_mut(heap, md).base.ext_refs.erase(p);
        }
    }

    fn use_memory(&mut self, size: usize) {
        self.current_memory_used += size;
    }
}
