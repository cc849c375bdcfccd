//! Error Module - isogc Error Types
//!
//! Defines the recoverable errors surfaced by region operations.
//!
//! # Error Categories
//!
//! ## Memory Errors
//! - `OutOfMemory` - Heap budget exhausted
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid configuration
//! - `InvalidArgument` - Invalid function argument
//!
//! Everything else that can go wrong inside a region (wrong region kind on
//! merge, a root that is not an iso, a stale object id, an unknown class
//! during traversal) is a broken contract, not an error. Those halt through
//! [`assert_context!`](crate::assert_context) since continuing after a ring
//! invariant is violated would corrupt the heap.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for isogc operations
///
/// # Examples
///
/// ```rust
/// use isogc::GcError;
///
/// fn handle_error(err: GcError) {
///     match err {
///         GcError::OutOfMemory { requested, available } => {
///             eprintln!("OOM: requested {}, available {}", requested, available);
///         }
///         _ => {
///             eprintln!("Other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum GcError {
    /// Out of memory - heap budget exhausted
    ///
    /// **When returned:** Allocation request exceeds `GcConfig::max_heap_size`
    ///
    /// **Recovery strategy:** Collect the owning region, release dead
    /// subregions, or fail gracefully
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// Configuration error
    ///
    /// **When returned:** `Heap::new` was given a configuration that does not
    /// validate
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Invalid argument
    ///
    /// **When returned:** Function argument fails validation
    ///
    /// **Example scenarios:**
    /// - Field index past the descriptor's field count
    /// - Descriptor with a zero size
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl GcError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GcError::OutOfMemory { .. })
    }

    /// Check if this error indicates a bug in the caller
    pub fn is_bug(&self) -> bool {
        matches!(self, GcError::InvalidArgument(_))
    }
}

/// Result type alias for isogc operations
pub type Result<T> = std::result::Result<T, GcError>;

/// Assertion with context for region contract checks
///
/// Contract violations are fatal: the macro panics with the stringified
/// condition and a formatted context message.
#[macro_export]
macro_rules! assert_context {
    ($cond:expr, $context:expr) => {
        if !$cond {
            panic!("Assertion failed at {}: {}", stringify!($cond), $context);
        }
    };
    ($cond:expr, $context:expr, $($arg:tt)*) => {
        if !$cond {
            panic!("Assertion failed at {}: {}", stringify!($cond), format!($context, $($arg)*));
        }
    };
}
