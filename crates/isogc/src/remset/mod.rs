//! Remset Module - Per-region bookkeeping of outside references
//!
//! Every region owns two tables:
//! - a [`RememberedSet`] of immutables and cowns the region holds a
//!   reference count on, marked during collection and pruned by the sweep
//! - an [`ExternalReferenceTable`] of members that handed out weak
//!   [`ExternalRef`] handles, erased when the member is swept
//!
//! Neither table touches the heap. Reference-count effects are returned to
//! the caller, which applies them once the region is no longer borrowed.

pub mod ext_ref;
pub mod remembered_set;

pub use ext_ref::{ExternalRef, ExternalReferenceTable};
pub use remembered_set::{RcAdjust, RememberedSet, SweepOutcome, TransferOwnership};
