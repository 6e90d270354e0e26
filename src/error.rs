//! Error types for the boundaries where external data enters the crate.
//!
//! In-process contract violations (size mismatches, out-of-range bits,
//! traversal-order violations) are programming errors and panic at the point
//! of detection. The variants here cover the storage boundary only: decoding
//! big-endian key bytes and narrowing an index to a machine word.

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A big-endian key had the wrong byte count for the target vector.
    #[error("big-endian input is {actual} bytes, expected {expected}")]
    ByteLength {
        /// Required byte count, `ceil(size / 8)`.
        expected: usize,
        /// Byte count actually supplied.
        actual: usize,
    },

    /// A big-endian key set padding bits above the vector size.
    #[error("big-endian input sets bits beyond a {size}-bit vector")]
    PaddingBits {
        /// Size of the target vector.
        size: usize,
    },

    /// A wide value was narrowed to `u64` but does not fit.
    #[error("value does not fit in a u64: bit {bit} is set")]
    U64Overflow {
        /// Lowest set bit at or above position 64.
        bit: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
