//! Marker Module - Traversal worklists
//!
//! Marking in a trace region is a depth-first walk from the root:
//! - `Iso` and `Marked` objects are skipped (subregions are not entered)
//! - `Unmarked` objects become `Marked` and their fields are pushed
//! - Immutables and cowns are marked in the region's remembered set
//!
//! The walk itself lives with the region (`region::trace`); this module
//! provides the explicit stack it runs on.

pub mod object_stack;

pub use object_stack::ObjectStack;
