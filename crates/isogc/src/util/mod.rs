//! Util Module - Size Classes
//!
//! Allocation sizes are quantized into geometric size classes with two
//! mantissa bits: 16, 20, 24, 28, 32, 40, 48, 56, 64, 80, ...
//!
//! The heap charges every object its size-class bytes, and trace regions
//! store their previous live-byte count as a single `SizeClass` byte.

use serde::{Deserialize, Serialize};

/// Number of mantissa bits per power of two
const INTERMEDIATE_BITS: u32 = 2;

/// Smallest non-empty size class in bytes
pub const MIN_ALLOC_SIZE: usize = 16;

/// Compact size class index
///
/// Class 0 stands for zero bytes. Every other class `c` covers
/// `(4 + m) << (e + 2)` bytes where `e = (c - 1) / 4` and `m = (c - 1) % 4`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SizeClass(u8);

impl SizeClass {
    /// The empty size class
    pub const ZERO: SizeClass = SizeClass(0);

    /// Raw class index
    pub fn index(self) -> u8 {
        self.0
    }
}

/// Quantize `size` to the smallest size class that can hold it
pub fn size_to_sizeclass(size: usize) -> SizeClass {
    if size == 0 {
        return SizeClass::ZERO;
    }

    let v = size.max(MIN_ALLOC_SIZE) - 1;
    let e = usize::BITS - 1 - v.leading_zeros();
    let k = e - INTERMEDIATE_BITS;
    let m = (v >> k) as u32 - (1 << INTERMEDIATE_BITS);

    SizeClass((4 * k + m - 6) as u8)
}

/// Upper bound in bytes of a size class
///
/// Saturates at `usize::MAX` for classes past the address space.
pub fn sizeclass_to_size(sc: SizeClass) -> usize {
    if sc.0 == 0 {
        return 0;
    }

    let c = (sc.0 - 1) as u32;
    let exponent = c / 4;
    let mantissa = c % 4;
    let size = ((4 + mantissa) as u128) << (exponent + INTERMEDIATE_BITS);

    size.min(usize::MAX as u128) as usize
}

/// Round `size` up to its size-class bytes
pub fn round_size(size: usize) -> usize {
    sizeclass_to_size(size_to_sizeclass(size))
}
