//! Configuration Module - Heap Budget and Collection Trigger
//!
//! Collection is always requested by the owner of a region. The two memory
//! counters kept by every trace region (live bytes now, size-class-quantized
//! live bytes after the previous sweep) only become a policy once combined
//! with the parameters here.

use crate::util::{sizeclass_to_size, SizeClass};

/// Main configuration for an isogc heap
///
/// # Examples
///
/// ```rust
/// use isogc::GcConfig;
///
/// // Use default configuration
/// let config = GcConfig::default();
///
/// // Collect more eagerly, with a hard 64MB budget
/// let config = GcConfig {
///     max_heap_size: 64 * 1024 * 1024,
///     growth_factor: 1.5,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Maximum bytes the heap may hand out, measured in size-class bytes
    ///
    /// Allocation past this limit fails with `GcError::OutOfMemory`.
    /// 0 means unlimited.
    ///
    /// Default: 0
    pub max_heap_size: usize,

    /// Growth factor for the collection trigger
    ///
    /// A region is due for collection when its live bytes exceed
    /// `growth_factor` times the live bytes left after its previous sweep.
    ///
    /// Default: 2.0
    pub growth_factor: f32,

    /// Lower bound for the collection trigger in bytes
    ///
    /// Keeps tiny regions from collecting on every allocation.
    ///
    /// Default: 4KB
    pub min_collect_bytes: usize,

    /// Enable verbose logging
    ///
    /// Logs every collection at `info` level instead of `debug`.
    /// Default: false
    pub verbose: bool,

    /// Enable per-cycle statistics
    ///
    /// When disabled, `gc` still returns a `GcCycleStats` but skips timing.
    /// Default: true
    pub stats_enabled: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            max_heap_size: 0,
            growth_factor: 2.0,
            min_collect_bytes: 4 * KB,
            verbose: false,
            stats_enabled: true,
        }
    }
}

impl GcConfig {
    /// Validate configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use isogc::GcConfig;
    ///
    /// let config = GcConfig {
    ///     growth_factor: 0.5,  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.growth_factor.is_finite() || self.growth_factor < 1.0 {
            return Err(ConfigError::InvalidGrowthFactor(format!(
                "growth_factor must be a finite value >= 1.0, got {}",
                self.growth_factor
            )));
        }

        if self.max_heap_size != 0 && self.max_heap_size < MIN_HEAP_SIZE {
            return Err(ConfigError::InvalidHeapSize(format!(
                "max_heap_size must be 0 (unlimited) or at least {} bytes",
                MIN_HEAP_SIZE
            )));
        }

        if self.max_heap_size != 0 && self.min_collect_bytes > self.max_heap_size {
            return Err(ConfigError::InvalidThreshold(
                "min_collect_bytes cannot exceed max_heap_size".to_string(),
            ));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - ISOGC_MAX_HEAP
    /// - ISOGC_GROWTH_FACTOR
    /// - ISOGC_MIN_COLLECT
    /// - ISOGC_VERBOSE
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ISOGC_MAX_HEAP") {
            if let Ok(size) = val.parse::<usize>() {
                config.max_heap_size = size;
            }
        }

        if let Ok(val) = std::env::var("ISOGC_GROWTH_FACTOR") {
            if let Ok(factor) = val.parse::<f32>() {
                config.growth_factor = factor;
            }
        }

        if let Ok(val) = std::env::var("ISOGC_MIN_COLLECT") {
            if let Ok(bytes) = val.parse::<usize>() {
                config.min_collect_bytes = bytes;
            }
        }

        if let Ok(val) = std::env::var("ISOGC_VERBOSE") {
            config.verbose = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }

    /// Byte count above which a region with the given previous usage is due
    pub fn collect_threshold(&self, previous: SizeClass) -> usize {
        let grown = (sizeclass_to_size(previous) as f64 * self.growth_factor as f64) as usize;
        grown.max(self.min_collect_bytes)
    }

    /// Caller-side collection heuristic
    ///
    /// Returns true once `current` live bytes exceed the threshold derived
    /// from the previous cycle's quantized usage.
    pub fn should_collect(&self, current: usize, previous: SizeClass) -> bool {
        current > self.collect_threshold(previous)
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid heap size: {0}")]
    InvalidHeapSize(String),

    #[error("Invalid growth factor: {0}")]
    InvalidGrowthFactor(String),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
}

const KB: usize = 1024;

/// Smallest non-zero heap budget accepted by `validate`
const MIN_HEAP_SIZE: usize = 4 * KB;
