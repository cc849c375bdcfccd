//! External references - weak handles to region members
//!
//! A handle stays resolvable while its target is alive and still recorded
//! by the region that now owns it. Sweeping the target erases its entry, so
//! later resolution fails instead of returning a dangling id.

use crate::object::ObjectId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Weak handle to a region member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef {
    target: ObjectId,
    id: u64,
}

impl ExternalRef {
    pub(crate) fn new(target: ObjectId, id: u64) -> Self {
        Self { target, id }
    }

    /// Object the handle was created for, whether or not it is still alive
    pub fn target(&self) -> ObjectId {
        self.target
    }

    /// Heap-unique handle id
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Member -> handle table of a single region
#[derive(Debug, Default)]
pub struct ExternalReferenceTable {
    refs: FxHashMap<ObjectId, ExternalRef>,
}

impl ExternalReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: ExternalRef) {
        self.refs.insert(handle.target, handle);
    }

    pub fn get(&self, target: ObjectId) -> Option<ExternalRef> {
        self.refs.get(&target).copied()
    }

    pub fn erase(&mut self, target: ObjectId) -> Option<ExternalRef> {
        self.refs.remove(&target)
    }

    /// `handle` is still recorded here
    pub fn resolve(&self, handle: &ExternalRef) -> Option<ObjectId> {
        match self.refs.get(&handle.target) {
            Some(recorded) if recorded.id == handle.id => Some(handle.target),
            _ => None,
        }
    }

    pub fn merge(&mut self, other: ExternalReferenceTable) {
        self.refs.extend(other.refs);
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
