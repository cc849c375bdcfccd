//! Heap Module - Node storage shared by all regions
//!
//! The heap stores every node: region members, region metadata objects,
//! immutables and cowns. Regions never own memory directly; they thread
//! their members through `next` links in the headers stored here.
//!
//! Heap Structure:
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                        Heap                          │
//! │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐        │
//! │  │ slot 0 │ │ slot 1 │ │ slot 2 │ │  ...   │  slab  │
//! │  │ gen 3  │ │ gen 0  │ │ free   │ │        │        │
//! │  └────────┘ └────────┘ └────────┘ └────────┘        │
//! │  byte budget (size-class bytes)   event sink (opt)  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every allocation is charged its size-class bytes against
//! `GcConfig::max_heap_size`. Access through a freed id is a contract
//! violation and panics.

mod slab;

use crate::assert_context;
use crate::config::GcConfig;
use crate::error::{GcError, Result};
use crate::logging::{GcEvent, GcEventSink};
use crate::marker::ObjectStack;
use crate::object::{Body, Class, Descriptor, Object, ObjectId};
use crate::region::RegionMeta;
use crate::stats::HeapStats;
use crate::util::round_size;
use rustc_hash::FxHashMap;
use slab::Slab;
use std::sync::Arc;

/// Heap - owner of every node
pub struct Heap {
    slab: Slab,

    /// Configuration (validated)
    config: GcConfig,

    /// Heap-wide counters
    stats: HeapStats,

    /// Next external reference handle id
    next_ext_ref: u64,

    /// SCC root -> `SccPtr` members, freed with the root
    scc_members: FxHashMap<ObjectId, Vec<ObjectId>>,

    /// Diagnostic sink
    sink: Option<Arc<dyn GcEventSink>>,
}

impl Heap {
    /// Create a heap without a diagnostic sink
    pub fn new(config: GcConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            slab: Slab::default(),
            config,
            stats: HeapStats::default(),
            next_ext_ref: 1,
            scc_members: FxHashMap::default(),
            sink: None,
        })
    }

    /// Create a heap that reports every region event to `sink`
    pub fn with_sink(config: GcConfig, sink: Arc<dyn GcEventSink>) -> Result<Self> {
        let mut heap = Self::new(config)?;
        heap.sink = Some(sink);
        Ok(heap)
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Snapshot of heap-wide counters
    pub fn stats(&self) -> HeapStats {
        self.stats.clone()
    }

    /// Size-class bytes currently handed out
    pub fn bytes_in_use(&self) -> usize {
        self.stats.bytes_in_use
    }

    /// Number of live nodes, region metadata objects included
    pub fn live_objects(&self) -> usize {
        self.slab.len()
    }

    /// Ids of every live node
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.slab.ids().collect()
    }

    /// `id` refers to a live node
    pub fn contains(&self, id: ObjectId) -> bool {
        self.slab.get(id).is_some()
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.slab.get(id)
    }

    // === Allocation ===

    /// Charge `descriptor` against the budget and store the node `build` makes
    pub(crate) fn alloc_with(
        &mut self,
        descriptor: &'static Descriptor,
        build: impl FnOnce(ObjectId) -> Object,
    ) -> Result<ObjectId> {
        if descriptor.size == 0 {
            return Err(GcError::InvalidArgument(format!(
                "descriptor '{}' has zero size",
                descriptor.name
            )));
        }

        let bytes = round_size(descriptor.size);
        let max = self.config.max_heap_size;
        if max != 0 && self.stats.bytes_in_use + bytes > max {
            let available = max - self.stats.bytes_in_use;
            self.stats.allocation_failures += 1;
            log::warn!(
                "allocation of {} bytes for '{}' refused, {} available",
                bytes,
                descriptor.name,
                available
            );
            self.emit(|| GcEvent::AllocationFailure {
                requested: bytes,
                available,
            });
            return Err(GcError::OutOfMemory {
                requested: bytes,
                available,
            });
        }

        self.stats.record_alloc(bytes);
        Ok(self.slab.insert_with(build))
    }

    /// Allocate an unlinked `Unmarked` object
    pub(crate) fn alloc(&mut self, descriptor: &'static Descriptor) -> Result<ObjectId> {
        self.alloc_with(descriptor, |_| Object::with_fields(descriptor))
    }

    /// Allocate the root of a new immutable SCC with a reference count of 1
    pub fn alloc_immutable(&mut self, descriptor: &'static Descriptor) -> Result<ObjectId> {
        let id = self.alloc(descriptor)?;
        self.object_mut(id).header.init_shared(Class::Rc, None);
        self.scc_members.insert(id, Vec::new());
        Ok(id)
    }

    /// Allocate a further member of the immutable SCC rooted at `root`
    pub fn alloc_scc_member(
        &mut self,
        root: ObjectId,
        descriptor: &'static Descriptor,
    ) -> Result<ObjectId> {
        assert_context!(
            self.class(root) == Class::Rc,
            "{} is not the root of an immutable SCC",
            root
        );

        let id = self.alloc(descriptor)?;
        self.object_mut(id)
            .header
            .init_shared(Class::SccPtr, Some(root));
        self.scc_members.entry(root).or_default().push(id);
        Ok(id)
    }

    /// Allocate a cown with a reference count of 1
    pub fn alloc_cown(&mut self, descriptor: &'static Descriptor) -> Result<ObjectId> {
        let id = self.alloc(descriptor)?;
        self.object_mut(id).header.init_shared(Class::Cown, None);
        Ok(id)
    }

    /// Free a node
    ///
    /// # Panics
    ///
    /// Freeing a node twice is fatal.
    pub(crate) fn dealloc(&mut self, id: ObjectId) {
        let object = match self.slab.remove(id) {
            Some(object) => object,
            None => stale(id),
        };

        let type_name = object.header.descriptor().name;
        self.stats.record_free(round_size(object.header.size()));
        log::trace!("deallocated {} ({})", id, type_name);
        self.emit(|| GcEvent::Deallocated {
            object: id,
            type_name,
        });
    }

    // === Shared Objects ===

    /// SCC root of an immutable, or the object itself
    pub fn immutable_root(&self, id: ObjectId) -> ObjectId {
        let header = &self.object(id).header;
        if header.class() == Class::SccPtr {
            match header.scc_root() {
                Some(root) => root,
                None => stale(id),
            }
        } else {
            id
        }
    }

    /// Reference count of an immutable (its SCC root) or cown
    pub fn rc(&self, id: ObjectId) -> usize {
        let root = self.immutable_root(id);
        self.object(root).header.rc()
    }

    pub fn incref(&mut self, id: ObjectId) {
        let root = self.immutable_root(id);
        let header = &mut self.object_mut(root).header;
        assert_context!(
            matches!(header.class(), Class::Rc | Class::Cown),
            "{} is not reference counted",
            root
        );
        header.incref();
    }

    /// Release one count; returns true when that freed the object
    ///
    /// Freeing an SCC root frees all of its members.
    pub fn decref(&mut self, id: ObjectId) -> bool {
        let root = self.immutable_root(id);
        let header = &mut self.object_mut(root).header;
        assert_context!(
            matches!(header.class(), Class::Rc | Class::Cown),
            "{} is not reference counted",
            root
        );
        if header.decref() > 0 {
            return false;
        }

        for member in self.scc_members.remove(&root).unwrap_or_default() {
            self.dealloc(member);
        }
        self.dealloc(root);
        true
    }

    // === Object Queries ===

    pub fn class(&self, id: ObjectId) -> Class {
        self.object(id).header.class()
    }

    pub fn descriptor(&self, id: ObjectId) -> &'static Descriptor {
        self.object(id).header.descriptor()
    }

    pub fn size(&self, id: ObjectId) -> usize {
        self.object(id).header.size()
    }

    pub fn needs_finaliser_ring(&self, id: ObjectId) -> bool {
        self.object(id).header.needs_finaliser_ring()
    }

    pub fn has_ext_ref(&self, id: ObjectId) -> bool {
        self.object(id).header.has_ext_ref()
    }

    pub fn fields(&self, id: ObjectId) -> &[Option<ObjectId>] {
        self.object(id).fields()
    }

    /// Read field `index` of `id`
    ///
    /// # Panics
    ///
    /// Panics when `index` is past the descriptor's field count.
    pub fn field(&self, id: ObjectId, index: usize) -> Option<ObjectId> {
        let fields = self.fields(id);
        assert_context!(
            index < fields.len(),
            "field {} out of bounds for {} with {} fields",
            index,
            id,
            fields.len()
        );
        fields[index]
    }

    /// Write field `index` of `id`
    pub fn set_field(&mut self, id: ObjectId, index: usize, value: Option<ObjectId>) -> Result<()> {
        let object = self.object_mut(id);
        if object.header.class().is_immutable() {
            return Err(GcError::InvalidArgument(format!(
                "cannot write field of immutable {}",
                id
            )));
        }

        match &mut object.body {
            Body::Fields(fields) if index < fields.len() => {
                fields[index] = value;
                Ok(())
            },
            Body::Fields(fields) => Err(GcError::InvalidArgument(format!(
                "field {} out of bounds for {} with {} fields",
                index,
                id,
                fields.len()
            ))),
            Body::Region(_) => Err(GcError::InvalidArgument(format!(
                "{} is a region metadata object",
                id
            ))),
        }
    }

    // === Ring Links ===

    pub(crate) fn next(&self, id: ObjectId) -> ObjectId {
        match self.object(id).header.next() {
            Some(next) => next,
            None => panic!("Assertion failed at ring link: {} is not linked", id),
        }
    }

    pub(crate) fn set_next(&mut self, id: ObjectId, next: ObjectId) {
        self.object_mut(id).header.set_next(next);
    }

    pub(crate) fn init_next(&mut self, id: ObjectId, next: ObjectId) {
        self.object_mut(id).header.init_next(next);
    }

    pub(crate) fn init_iso(&mut self, id: ObjectId, region: ObjectId) {
        self.object_mut(id).header.init_iso(region);
    }

    pub(crate) fn set_class(&mut self, id: ObjectId, class: Class) {
        self.object_mut(id).header.set_class(class);
    }

    pub(crate) fn mark(&mut self, id: ObjectId) {
        self.object_mut(id).header.mark();
    }

    pub(crate) fn unmark(&mut self, id: ObjectId) {
        self.object_mut(id).header.unmark();
    }

    pub(crate) fn set_ext_ref(&mut self, id: ObjectId, ext_ref: bool) {
        self.object_mut(id).header.set_ext_ref(ext_ref);
    }

    pub(crate) fn next_ext_ref_id(&mut self) -> u64 {
        let id = self.next_ext_ref;
        self.next_ext_ref += 1;
        id
    }

    /// Region metadata object of the iso `root`
    pub(crate) fn region_of(&self, root: ObjectId) -> ObjectId {
        assert_context!(
            self.class(root) == Class::Iso,
            "{} is not the root of a region",
            root
        );
        self.next(root)
    }

    pub(crate) fn region_meta(&self, md: ObjectId) -> &RegionMeta {
        match &self.object(md).body {
            Body::Region(meta) => meta,
            Body::Fields(_) => panic!("Assertion failed at region metadata: {} is not a region", md),
        }
    }

    pub(crate) fn region_meta_mut(&mut self, md: ObjectId) -> &mut RegionMeta {
        match &mut self.object_mut(md).body {
            Body::Region(meta) => meta,
            Body::Fields(_) => panic!("Assertion failed at region metadata: {} is not a region", md),
        }
    }

    // === Traversal ===

    /// Push every non-null field of `id`
    pub(crate) fn trace(&self, id: ObjectId, stack: &mut ObjectStack) {
        stack.extend(self.fields(id).iter().flatten().copied());
    }

    /// Run the finaliser of `id`, if it has one
    pub(crate) fn finalise(&mut self, id: ObjectId) -> bool {
        let descriptor = self.descriptor(id);
        let Some(finaliser) = descriptor.finaliser else {
            return false;
        };

        finaliser(&*self, id);
        self.stats.finalisers_run += 1;
        log::trace!("finalised {} ({})", id, descriptor.name);
        self.emit(|| GcEvent::Finalised {
            object: id,
            type_name: descriptor.name,
        });
        true
    }

    /// Push every iso field of `id` other than `root` onto `collect`
    pub(crate) fn find_iso_fields(
        &self,
        id: ObjectId,
        root: ObjectId,
        collect: &mut ObjectStack,
    ) -> usize {
        let mut found = 0;
        let fields = self.fields(id);
        for (i, &field) in fields.iter().enumerate() {
            let Some(field) = field else {
                continue;
            };
            // Several fields of one owner may name the same subregion.
            if field == root || fields[..i].contains(&Some(field)) {
                continue;
            }
            if self.is_iso(field) {
                self.emit(|| GcEvent::SubregionDiscovered {
                    owner: id,
                    subregion: field,
                });
                collect.push(field);
                found += 1;
            }
        }
        found
    }

    /// First field of `id` naming the root of a region other than `root`
    pub(crate) fn foreign_iso_field(&self, id: ObjectId, root: ObjectId) -> Option<ObjectId> {
        self.fields(id)
            .iter()
            .flatten()
            .copied()
            .find(|&field| field != root && self.is_iso(field))
    }

    /// `id` is a live region root; stale ids are not
    fn is_iso(&self, id: ObjectId) -> bool {
        self.slab.get(id).map(|o| o.header.class()) == Some(Class::Iso)
    }

    // === Bookkeeping ===

    pub(crate) fn stats_mut(&mut self) -> &mut HeapStats {
        &mut self.stats
    }

    /// Report an event to the sink; `event` is only built when one is set
    pub(crate) fn emit(&self, event: impl FnOnce() -> GcEvent) {
        if let Some(sink) = &self.sink {
            sink.record(&event());
        }
    }

    fn object(&self, id: ObjectId) -> &Object {
        match self.slab.get(id) {
            Some(object) => object,
            None => stale(id),
        }
    }

    fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        match self.slab.get_mut(id) {
            Some(object) => object,
            None => stale(id),
        }
    }
}

#[cold]
#[track_caller]
fn stale(id: ObjectId) -> ! {
    panic!("Assertion failed at live object: {} is freed or stale", id)
}
