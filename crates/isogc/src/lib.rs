//! # isogc - Isolated, Independently Collectible Regions
//!
//! isogc partitions a heap into regions. A region is reachable only through
//! one root ("iso") object, is owned by one execution context at a time, and
//! is reclaimed on its own without pausing anything else.
//!
//! ## Overview
//!
//! - **Trace Regions**: Mark-and-sweep from the root, members threaded
//!   through two rings split by finaliser need
//! - **Arena Regions**: Members kept until the whole region is released
//! - **Subregions**: Unreachable nested regions are released iteratively
//!   after a sweep, however deep the nesting
//! - **Merge / Root Swap**: Constant-time ring splicing
//! - **Remembered Sets**: Reference counts a region holds on immutables and
//!   cowns, pruned by the sweep
//!
//! ## Quick Start
//!
//! ```rust
//! use isogc::{Descriptor, GcConfig, Heap, RegionTrace};
//!
//! static NODE: Descriptor = Descriptor::new("node", 32, 2);
//!
//! fn main() -> isogc::Result<()> {
//!     let mut heap = Heap::new(GcConfig::default())?;
//!
//!     // The root of the region is returned
//!     let root = RegionTrace::create(&mut heap, &NODE)?;
//!     let kept = RegionTrace::alloc(&mut heap, root, &NODE)?;
//!     let garbage = RegionTrace::alloc(&mut heap, root, &NODE)?;
//!     heap.set_field(root, 0, Some(kept))?;
//!
//!     // Collection is always requested by the owner
//!     let stats = RegionTrace::gc(&mut heap, root);
//!
//!     assert_eq!(stats.objects_swept, 1);
//!     assert!(heap.contains(kept));
//!     assert!(!heap.contains(garbage));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                         Heap                          │
//! │                                                       │
//! │   iso ──► RegionTrace ──► m1 ──► m2 ──► ... ──► iso   │  primary ring
//! │                │                                      │
//! │                └──► s1 ──► s2 ──► RegionTrace         │  secondary ring
//! │                                                       │
//! │   RememberedSet: immutables / cowns held              │
//! │   ExternalReferenceTable: weak handles handed out     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ### Collection Phases
//!
//! 1. **Mark**: depth-first from the root, subregions are not entered
//! 2. **Sweep finaliser ring**: finalise dead members, queue their subregions
//! 3. **Sweep other ring**: free dead members in place
//! 4. **Sweep remembered set**: release counts no longer reachable
//! 5. **Release subregions**: drain the queue, dispatching by region kind
//!
//! ## Modules
//!
//! - [`config`]: Heap budget and collection trigger
//! - [`error`]: Error types and contract assertions
//! - [`heap`]: Node storage, shared objects, diagnostics sink
//! - [`logging`]: Region events and the recording logger
//! - [`marker`]: Traversal worklists
//! - [`object`]: Object model
//! - [`region`]: Trace and arena regions
//! - [`remset`]: Remembered sets and external references
//! - [`stats`]: Per-cycle and heap-wide statistics
//! - [`util`]: Size classes
//!
//! ## Limitations
//!
//! - **Single owner**: no operation is safe to run concurrently on one heap
//! - **Cross-region cycles**: only through remembered-set tracked objects

// Core modules
pub mod config;
pub mod error;

// Object storage
pub mod heap;
pub mod object;

// Region algorithm components
pub mod marker;
pub mod region;
pub mod remset;

// Monitoring
pub mod logging;
pub mod stats;

// Utilities
pub mod util;

// Re-export main types for convenience
pub use config::{ConfigError, GcConfig};
pub use error::{GcError, Result};
pub use heap::Heap;
pub use logging::{GcEvent, GcEventSink, GcLogger, GcLoggerConfig, LogLevel};
pub use object::{Class, Descriptor, Finaliser, ObjectId};
pub use region::{Region, RegionArena, RegionIter, RegionKind, RegionTrace, RingFilter};
pub use remset::{ExternalRef, TransferOwnership};
pub use stats::{GcCycleStats, HeapStats};
pub use util::{size_to_sizeclass, sizeclass_to_size, SizeClass};

/// isogc version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a heap with default configuration
///
/// # Examples
///
/// ```rust
/// let heap = isogc::init()?;
/// assert_eq!(heap.live_objects(), 0);
/// # Ok::<(), isogc::GcError>(())
/// ```
pub fn init() -> Result<Heap> {
    Heap::new(GcConfig::default())
}

/// Create a heap with custom configuration
///
/// Fails with `GcError::Configuration` when `config` does not validate.
pub fn init_with_config(config: GcConfig) -> Result<Heap> {
    Heap::new(config)
}
