//! Descriptor - Static type information for region objects
//!
//! A descriptor tells the collector how big an object is, how many reference
//! fields it has, and what to run before it is reclaimed.
//!
//! # Example
//!
//! ```rust
//! use isogc::{Descriptor, Heap, ObjectId};
//!
//! fn close_handle(heap: &Heap, object: ObjectId) {
//!     // Siblings swept in the same cycle are still readable here.
//!     let _ = heap.fields(object);
//! }
//!
//! static NODE: Descriptor = Descriptor::new("node", 32, 2);
//! static HANDLE: Descriptor = Descriptor::new("handle", 48, 1).with_finaliser(close_handle);
//! static OWNER: Descriptor = Descriptor::new("owner", 32, 4).with_iso_fields();
//!
//! assert!(!NODE.needs_finaliser_ring());
//! assert!(HANDLE.needs_finaliser_ring());
//! assert!(OWNER.needs_finaliser_ring());
//! ```

use super::ObjectId;
use crate::heap::Heap;
use std::fmt;

/// Finaliser callback
///
/// Runs before the object is reclaimed. The heap is read-only: a finaliser
/// may inspect the object and anything it still points to, but cannot
/// allocate or free.
pub type Finaliser = fn(&Heap, ObjectId);

/// Static description of an object layout
pub struct Descriptor {
    /// Type name, used in diagnostics
    pub name: &'static str,
    /// Size in bytes charged to the owning region
    pub size: usize,
    /// Number of reference fields
    pub fields: usize,
    /// Optional finaliser
    pub finaliser: Option<Finaliser>,
    /// Fields of this type may own subregions (point at iso objects)
    pub possibly_iso_fields: bool,
}

impl Descriptor {
    pub const fn new(name: &'static str, size: usize, fields: usize) -> Self {
        Self {
            name,
            size,
            fields,
            finaliser: None,
            possibly_iso_fields: false,
        }
    }

    pub const fn with_finaliser(self, finaliser: Finaliser) -> Self {
        Self {
            finaliser: Some(finaliser),
            ..self
        }
    }

    pub const fn with_iso_fields(self) -> Self {
        Self {
            possibly_iso_fields: true,
            ..self
        }
    }

    #[inline]
    pub fn has_finaliser(&self) -> bool {
        self.finaliser.is_some()
    }

    /// Whether objects of this type are swept by the finaliser pass
    ///
    /// Objects that may own subregions belong there too, since only dead
    /// finaliser-ring members are scanned for iso fields.
    #[inline]
    pub fn needs_finaliser_ring(&self) -> bool {
        self.finaliser.is_some() || self.possibly_iso_fields
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("fields", &self.fields)
            .field("finaliser", &self.finaliser.is_some())
            .field("possibly_iso_fields", &self.possibly_iso_fields)
            .finish()
    }
}
