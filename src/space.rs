//! The shape of the multidimensional space and the aligned intervals the
//! curve recursion produces.

use crate::bit_vector::BitVector;
use crate::content::{Content, IndexRange};

/// Immutable per-dimension bit depths with cached derived totals.
///
/// A spec of `[4, 2, 4]` describes a three-dimensional space whose first and
/// third axes hold 16 values and whose second holds 4; the compact index for
/// it is `4 + 2 + 4 = 10` bits wide. Zero-bit dimensions are allowed and
/// contribute nothing to the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiDimensionalSpec {
    bits_per_dimension: Vec<usize>,
    sum_bits_per_dimension: usize,
    max_bits_per_dimension: usize,
}

impl MultiDimensionalSpec {
    /// Creates a spec from per-dimension bit depths.
    pub fn new(bits_per_dimension: Vec<usize>) -> Self {
        let sum_bits_per_dimension = bits_per_dimension.iter().sum();
        let max_bits_per_dimension = bits_per_dimension.iter().copied().max().unwrap_or(0);
        MultiDimensionalSpec {
            bits_per_dimension,
            sum_bits_per_dimension,
            max_bits_per_dimension,
        }
    }

    /// Bit depth of each dimension.
    pub fn bits_per_dimension(&self) -> &[usize] {
        &self.bits_per_dimension
    }

    /// Number of dimensions.
    pub fn dimensions(&self) -> usize {
        self.bits_per_dimension.len()
    }

    /// Total index width in bits.
    pub fn sum_bits_per_dimension(&self) -> usize {
        self.sum_bits_per_dimension
    }

    /// Depth of the curve recursion.
    pub fn max_bits_per_dimension(&self) -> usize {
        self.max_bits_per_dimension
    }
}

/// The interval `[start, start + 2^level)` with an aligned start: the low
/// `level` bits of `start` are zero.
///
/// One such interval per recursion-tree node describes the node's index
/// slice; one per dimension describes the node's orthotope. The value is a
/// snapshot; if it was built around a vector that is later mutated, clone
/// first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pow2LengthBitSetRange {
    start: BitVector,
    level: usize,
}

impl Pow2LengthBitSetRange {
    /// Creates the interval `[start, start + 2^level)`.
    ///
    /// # Panics
    /// Panics unless `level <= start.size()` and the low `level` bits of
    /// `start` are clear.
    pub fn new(start: BitVector, level: usize) -> Self {
        assert!(
            level <= start.size(),
            "level {level} out of range for a {}-bit start",
            start.size()
        );
        assert!(
            start.are_all_lowest_bits_clear(level),
            "start must be aligned to 2^{level}"
        );
        Pow2LengthBitSetRange { start, level }
    }

    /// Aligned lower bound.
    pub fn start(&self) -> &BitVector {
        &self.start
    }

    /// Log2 of the interval length.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Interval length, `2^level`.
    pub fn content<T: Content>(&self) -> T {
        T::pow2(self.level)
    }

    /// The interval in numeric form.
    pub fn to_range<T: Content>(&self) -> IndexRange<T> {
        let start = T::from_bit_vector(&self.start);
        let end = start.add(&T::pow2(self.level));
        IndexRange::of(start, end)
    }

    /// True iff `other` lies entirely inside this interval.
    ///
    /// # Panics
    /// Panics when the two starts have different sizes.
    pub fn encloses(&self, other: &Pow2LengthBitSetRange) -> bool {
        assert_eq!(
            self.start.size(),
            other.start.size(),
            "intervals over different spaces"
        );
        if self.level < other.level {
            return false;
        }
        (self.level..self.start.size()).all(|i| self.start.get(i) == other.start.get(i))
    }
}

/// Volume of an orthotope: the product of its per-dimension lengths, 1 for
/// zero dimensions.
pub fn orthotope_content<T: Content>(orthotope: &[Pow2LengthBitSetRange]) -> T {
    let total: usize = orthotope.iter().map(Pow2LengthBitSetRange::level).sum();
    T::pow2(total)
}
