//! Object Header - Per-object metadata used by regions
//!
//! Header Layout:
//! ┌─────────────────────────────────────────┐
//! │       Descriptor (&'static)             │  <- size, field count, finaliser
//! ├─────────────────────────────────────────┤
//! │       Class                             │  <- Iso / Unmarked / Marked /
//! │                                         │     SccPtr / Rc / Cown
//! ├─────────────────────────────────────────┤
//! │       Next link (Option<ObjectId>)      │  <- ring successor; for an Iso
//! │                                         │     object, its region metadata
//! ├─────────────────────────────────────────┤
//! │       SCC root / reference count        │  <- immutables and cowns only
//! ├─────────────────────────────────────────┤
//! │       External reference flag           │
//! └─────────────────────────────────────────┘
//!
//! The root of a region is always the tail of its primary ring, so the
//! successor of an Iso object is the region metadata object. The same link
//! therefore answers both "next in ring" and "which region owns this iso".

use super::Descriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a node in the [`Heap`](crate::Heap)
///
/// A slot index paired with the slot's generation. Freeing a node bumps the
/// generation, so a stale handle never aliases a later allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the heap
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot when this handle was issued
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Object class (color)
///
/// Closed set of states an object can be in. Region members move between
/// `Unmarked` and `Marked` during a collection; exactly one member per region
/// is `Iso`. The remaining classes describe objects owned outside any region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Class {
    /// Root of a region
    Iso,
    /// Mutable region member not (yet) reached this cycle
    Unmarked,
    /// Mutable region member reached this cycle
    Marked,
    /// Member of an immutable strongly connected component, points at its root
    SccPtr,
    /// Reference-counted root of an immutable strongly connected component
    Rc,
    /// Reference-counted concurrent owner
    Cown,
}

impl Class {
    /// Region member that is not the root
    #[inline]
    pub fn is_mutable(self) -> bool {
        matches!(self, Class::Unmarked | Class::Marked)
    }

    /// Part of a frozen (immutable) structure
    #[inline]
    pub fn is_immutable(self) -> bool {
        matches!(self, Class::Rc | Class::SccPtr)
    }

    /// Owned outside any region and tracked through remembered sets
    #[inline]
    pub fn is_external(self) -> bool {
        matches!(self, Class::Rc | Class::SccPtr | Class::Cown)
    }
}

/// Object header
pub struct Header {
    descriptor: &'static Descriptor,
    class: Class,
    next: Option<ObjectId>,
    scc_root: Option<ObjectId>,
    rc: usize,
    ext_ref: bool,
}

impl Header {
    /// Create a header for a fresh, unlinked region member
    pub fn new(descriptor: &'static Descriptor) -> Self {
        Self {
            descriptor,
            class: Class::Unmarked,
            next: None,
            scc_root: None,
            rc: 0,
            ext_ref: false,
        }
    }

    // === Descriptor ===

    #[inline]
    pub fn descriptor(&self) -> &'static Descriptor {
        self.descriptor
    }

    /// Accounting size of the object in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.descriptor.size
    }

    #[inline]
    pub fn needs_finaliser_ring(&self) -> bool {
        self.descriptor.needs_finaliser_ring()
    }

    // === Class Operations ===

    #[inline]
    pub fn class(&self) -> Class {
        self.class
    }

    #[inline]
    pub fn set_class(&mut self, class: Class) {
        self.class = class;
    }

    /// Unmarked -> Marked
    #[inline]
    pub fn mark(&mut self) {
        debug_assert_eq!(self.class, Class::Unmarked);
        self.class = Class::Marked;
    }

    /// Marked -> Unmarked
    #[inline]
    pub fn unmark(&mut self) {
        debug_assert_eq!(self.class, Class::Marked);
        self.class = Class::Unmarked;
    }

    // === Ring Link Operations ===

    #[inline]
    pub fn next(&self) -> Option<ObjectId> {
        self.next
    }

    /// Set the ring successor, keeping the class
    #[inline]
    pub fn set_next(&mut self, next: ObjectId) {
        self.next = Some(next);
    }

    /// Set the ring successor and reset the class to `Unmarked`
    #[inline]
    pub fn init_next(&mut self, next: ObjectId) {
        self.next = Some(next);
        self.class = Class::Unmarked;
    }

    /// Make this object the root of the region whose metadata is `region`
    #[inline]
    pub fn init_iso(&mut self, region: ObjectId) {
        self.next = Some(region);
        self.class = Class::Iso;
    }

    // === Shared Object Operations ===

    #[inline]
    pub fn scc_root(&self) -> Option<ObjectId> {
        self.scc_root
    }

    #[inline]
    pub(crate) fn init_shared(&mut self, class: Class, scc_root: Option<ObjectId>) {
        self.class = class;
        self.scc_root = scc_root;
        self.rc = if class == Class::SccPtr { 0 } else { 1 };
    }

    #[inline]
    pub fn rc(&self) -> usize {
        self.rc
    }

    #[inline]
    pub(crate) fn incref(&mut self) {
        self.rc += 1;
    }

    /// Returns the remaining count
    #[inline]
    pub(crate) fn decref(&mut self) -> usize {
        self.rc = self.rc.saturating_sub(1);
        self.rc
    }

    // === External Reference Flag ===

    #[inline]
    pub fn has_ext_ref(&self) -> bool {
        self.ext_ref
    }

    #[inline]
    pub(crate) fn set_ext_ref(&mut self, ext_ref: bool) {
        self.ext_ref = ext_ref;
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("descriptor", &self.descriptor.name)
            .field("class", &self.class)
            .field("next", &self.next)
            .field("rc", &self.rc)
            .field("ext_ref", &self.ext_ref)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static PLAIN: Descriptor = Descriptor::new("plain", 32, 2);

    fn create_test_header() -> Header {
        Header::new(&PLAIN)
    }

    #[test]
    fn test_new_header_is_unmarked_and_unlinked() {
        let header = create_test_header();
        assert_eq!(header.class(), Class::Unmarked);
        assert_eq!(header.next(), None);
        assert_eq!(header.size(), 32);
        assert!(!header.has_ext_ref());
        assert!(!header.needs_finaliser_ring());
    }

    #[test]
    fn test_mark_unmark() {
        let mut header = create_test_header();
        header.mark();
        assert_eq!(header.class(), Class::Marked);
        header.unmark();
        assert_eq!(header.class(), Class::Unmarked);
    }

    #[test]
    fn test_init_next_resets_class() {
        let mut header = create_test_header();
        let region = ObjectId::new(7, 0);
        header.init_iso(region);
        assert_eq!(header.class(), Class::Iso);
        assert_eq!(header.next(), Some(region));

        let other = ObjectId::new(3, 1);
        header.set_next(other);
        assert_eq!(header.class(), Class::Iso);

        header.init_next(other);
        assert_eq!(header.class(), Class::Unmarked);
        assert_eq!(header.next(), Some(other));
    }

    #[test]
    fn test_shared_refcounts() {
        let mut header = create_test_header();
        header.init_shared(Class::Rc, None);
        assert_eq!(header.rc(), 1);
        header.incref();
        assert_eq!(header.rc(), 2);
        assert_eq!(header.decref(), 1);
        assert_eq!(header.decref(), 0);
        assert_eq!(header.decref(), 0);
    }

    #[test]
    fn test_class_predicates() {
        assert!(Class::Unmarked.is_mutable());
        assert!(Class::Marked.is_mutable());
        assert!(!Class::Iso.is_mutable());
        assert!(Class::Rc.is_immutable());
        assert!(Class::SccPtr.is_immutable());
        assert!(!Class::Cown.is_immutable());
        assert!(Class::Cown.is_external());
        assert!(!Class::Iso.is_external());
    }

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId::new(12, 3).to_string(), "#12.3");
        assert_eq!(ObjectId::new(12, 3).index(), 12);
        assert_eq!(ObjectId::new(12, 3).generation(), 3);
    }
}
