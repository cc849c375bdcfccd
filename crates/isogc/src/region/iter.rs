//! Ring iteration over the members of a trace region

use super::trace::RegionTrace;
use crate::heap::Heap;
use crate::object::ObjectId;
use std::iter::FusedIterator;

/// Which members an iterator visits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingFilter {
    /// Members that do not need the finaliser ring
    NoFinaliser,
    /// Members that need the finaliser ring
    NeedsFinaliser,
    /// Primary ring then secondary ring
    Both,
}

/// Read-only walk over one or both rings
///
/// Holds a shared borrow of the heap, so the region cannot change while an
/// iterator is alive.
pub struct RegionIter<'h> {
    heap: &'h Heap,
    md: ObjectId,
    filter: RingFilter,
    next_not_root: ObjectId,
    last_not_root: ObjectId,
    ptr: Option<ObjectId>,
}

impl<'h> RegionIter<'h> {
    pub(crate) fn new(heap: &'h Heap, md: ObjectId, filter: RingFilter) -> Self {
        let reg = RegionTrace::meta(heap, md);
        let head = heap.next(md);

        let start = match filter {
            RingFilter::NoFinaliser if heap.needs_finaliser_ring(head) => reg.next_not_root,
            RingFilter::NeedsFinaliser if !heap.needs_finaliser_ring(head) => reg.next_not_root,
            _ => head,
        };

        Self {
            heap,
            md,
            filter,
            next_not_root: reg.next_not_root,
            last_not_root: reg.last_not_root,
            // An empty ring starts at the metadata object.
            ptr: (start != md).then_some(start),
        }
    }
}

impl Iterator for RegionIter<'_> {
    type Item = ObjectId;

    fn next(&mut self) -> Option<ObjectId> {
        let current = self.ptr?;
        let q = self.heap.next(current);

        self.ptr = if q != self.md {
            Some(q)
        } else if self.filter == RingFilter::Both
            && current != self.last_not_root
            && self.next_not_root != self.md
        {
            // End of the primary ring, continue with the secondary ring.
            Some(self.next_not_root)
        } else {
            None
        };

        Some(current)
    }
}

impl FusedIterator for RegionIter<'_> {}
