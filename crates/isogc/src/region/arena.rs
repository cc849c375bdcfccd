//! Arena Region - members live until the region is released
//!
//! Arena members are not linked into rings and are never collected
//! individually. Releasing the region scans every member for subregions,
//! runs finalisers and frees everything at once.

use super::{insert_remembered, release_counts, RegionBase, RegionKind, RegionMeta};
use crate::assert_context;
use crate::error::Result;
use crate::heap::Heap;
use crate::logging::GcEvent;
use crate::marker::ObjectStack;
use crate::object::{Class, Descriptor, Object, ObjectId};
use crate::remset::TransferOwnership;

/// Descriptor of arena region metadata objects
pub(crate) static ARENA_DESCRIPTOR: Descriptor =
    Descriptor::new("RegionArena", std::mem::size_of::<RegionArena>(), 0);

/// Metadata of an arena region
#[derive(Debug, Default)]
pub struct RegionArena {
    /// Members other than the root, in allocation order
    members: Vec<ObjectId>,
    /// Bytes of members, root included
    memory_used: usize,
    pub(crate) base: RegionBase,
}

impl RegionArena {
    /// Create an arena region whose root is a new object of type `descriptor`
    pub fn create(heap: &mut Heap, descriptor: &'static Descriptor) -> Result<ObjectId> {
        let root = heap.alloc(descriptor)?;
        let md = match heap.alloc_with(&ARENA_DESCRIPTOR, |_| {
            Object::with_region(
                &ARENA_DESCRIPTOR,
                RegionMeta::Arena(RegionArena {
                    memory_used: descriptor.size,
                    ..Default::default()
                }),
            )
        }) {
            Ok(md) => md,
            Err(err) => {
                heap.dealloc(root);
                return Err(err);
            },
        };

        heap.init_iso(root, md);
        heap.stats_mut().regions_created += 1;

        log::debug!("arena region {} created with root {}", md, root);
        heap.emit(|| GcEvent::RegionCreated {
            region: md,
            root,
            kind: RegionKind::Arena,
        });
        Ok(root)
    }

    /// Allocate an object of type `descriptor` in the arena rooted at `root`
    pub fn alloc(
        heap: &mut Heap,
        root: ObjectId,
        descriptor: &'static Descriptor,
    ) -> Result<ObjectId> {
        let md = Self::region(heap, root);
        let o = heap.alloc(descriptor)?;

        let reg = Self::meta_mut(heap, md);
        reg.members.push(o);
        reg.memory_used += descriptor.size;
        Ok(o)
    }

    /// Record shared object `o` in the remembered set of `into`'s arena
    pub fn insert(heap: &mut Heap, into: ObjectId, o: ObjectId, transfer: TransferOwnership) {
        let md = Self::region(heap, into);
        insert_remembered(heap, md, o, transfer);
    }

    /// Merge the arena rooted at `o` into the arena rooted at `into`
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
            Self::is_arena_region(heap, other),
            "cannot merge {:?} region {} into arena region {}",
            heap.region_meta(other).kind(),
            other,
            md
        );

        let absorbed = std::mem::take(Self::meta_mut(heap, other));
        heap.dealloc(other);
        heap.set_class(o, Class::Unmarked);

        let bytes = absorbed.memory_used;
        let reg = Self::meta_mut(heap, md);
        reg.members.push(o);
        reg.members.extend(absorbed.members);
        reg.memory_used += bytes;
        let surplus = reg.base.merge(absorbed.base);
        release_counts(heap, surplus);

        log::debug!("merged arena of {} into arena {} ({} bytes)", o, md, bytes);
        heap.emit(|| GcEvent::Merged {
            into,
            absorbed: o,
            bytes,
        });
    }

    /// Make member `next` the root of the arena currently rooted at `prev`
    pub fn swap_root(heap: &mut Heap, prev: ObjectId, next: ObjectId) {
        assert_context!(prev != next, "{} is already the root", prev);
        let md = Self::region(heap, prev);

        let reg = Self::meta_mut(heap, md);
        let slot = reg.members.iter().position(|&m| m == next);
        assert_context!(slot.is_some(), "{} is not a member of arena {}", next, md);
        if let Some(slot) = slot {
            reg.members[slot] = prev;
        }

        heap.set_class(prev, Class::Unmarked);
        heap.init_iso(next, md);

        log::debug!("arena {} root {} -> {}", md, prev, next);
        heap.emit(|| GcEvent::RootSwapped {
            region: md,
            old_root: prev,
            new_root: next,
            rings_swapped: false,
        });
    }

    /// Metadata of the arena rooted at `root`
    pub fn get(heap: &Heap, root: ObjectId) -> &RegionArena {
        let md = Self::region(heap, root);
        Self::meta(heap, md)
    }

    pub fn is_arena_region(heap: &Heap, md: ObjectId) -> bool {
        matches!(
            heap.get(md).and_then(Object::region_meta),
            Some(RegionMeta::Arena(_))
        )
    }

    /// Members other than the root
    pub fn members(&self) -> &[ObjectId] {
        &self.members
    }

    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    /// Free the whole arena rooted at `root`, pushing subregions onto `collect`
    ///
    /// Every finaliser runs before anything is freed. Returns the number of
    /// members freed, root included.
    pub(crate) fn release_internal(
        heap: &mut Heap,
        root: ObjectId,
        collect: &mut ObjectStack,
    ) -> usize {
        let md = Self::region(heap, root);
        log::trace!("releasing arena region {} rooted at {}", md, root);

        let RegionArena { members, base, .. } = std::mem::take(Self::meta_mut(heap, md));

        heap.find_iso_fields(root, root, collect);
        heap.finalise(root);
        for &m in &members {
            heap.find_iso_fields(m, root, collect);
            heap.finalise(m);
        }

        for &m in &members {
            heap.dealloc(m);
        }
        release_counts(heap, base.remembered_set.iter().collect());

        heap.dealloc(md);
        heap.dealloc(root);
        members.len() + 1
    }

    fn region(heap: &Heap, root: ObjectId) -> ObjectId {
        let md = heap.region_of(root);
        assert_context!(
            Self::is_arena_region(heap, md),
            "{} is not the root of an arena region",
            root
        );
        md
    }

    fn meta(heap: &Heap, md: ObjectId) -> &RegionArena {
        match heap.region_meta(md) {
            RegionMeta::Arena(reg) => reg,
            RegionMeta::Trace(_) => panic!("Assertion failed at arena region: {} is a trace region", md),
        }
    }

    fn meta_mut(heap: &mut Heap, md: ObjectId) -> &mut RegionArena {
        match heap.region_meta_mut(md) {
            RegionMeta::Arena(reg) => reg,
            RegionMeta::Trace(_) => panic!("Assertion failed at arena region: {} is a trace region", md),
        }
    }
}
