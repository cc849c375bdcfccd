//! Object Module - Region object model
//!
//! This module defines the structure of objects stored in the heap: a
//! [`Header`] shared by every node, followed by either reference fields or,
//! for region metadata objects, the region bookkeeping itself.

pub mod descriptor;
pub mod header;

pub use descriptor::{Descriptor, Finaliser};
pub use header::{Class, Header, ObjectId};

use crate::region::RegionMeta;

/// Heap node: header plus body
#[derive(Debug)]
pub struct Object {
    pub(crate) header: Header,
    pub(crate) body: Body,
}

#[derive(Debug)]
pub(crate) enum Body {
    /// Reference fields of an ordinary object
    Fields(Box<[Option<ObjectId>]>),
    /// Region metadata object
    Region(Box<RegionMeta>),
}

impl Object {
    pub(crate) fn with_fields(descriptor: &'static Descriptor) -> Self {
        Self {
            header: Header::new(descriptor),
            body: Body::Fields(vec![None; descriptor.fields].into_boxed_slice()),
        }
    }

    pub(crate) fn with_region(descriptor: &'static Descriptor, meta: RegionMeta) -> Self {
        Self {
            header: Header::new(descriptor),
            body: Body::Region(Box::new(meta)),
        }
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Reference fields; empty for region metadata objects
    #[inline]
    pub fn fields(&self) -> &[Option<ObjectId>] {
        match &self.body {
            Body::Fields(fields) => &fields[..],
            Body::Region(_) => &[],
        }
    }

    #[inline]
    pub fn is_region_metadata(&self) -> bool {
        matches!(self.body, Body::Region(_))
    }

    #[inline]
    pub(crate) fn region_meta(&self) -> Option<&RegionMeta> {
        match &self.body {
            Body::Region(meta) => Some(meta),
            Body::Fields(_) => None,
        }
    }
}
