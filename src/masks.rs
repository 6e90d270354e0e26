//! Per-level dimension masks for the compact curve.
//!
//! At recursion level `i` only the dimensions with more than `i` bits of
//! depth contribute a bit to the index; the rest are exhausted and carry an
//! implicit zero. The masks identify the live dimensions per level, and the
//! cumulative slice offsets say where each level's bits land in the compact
//! index. Everything here is derived once from the spec and then read-only.

use crate::bit_vector::BitVector;
use crate::space::MultiDimensionalSpec;

/// Dimension `j` of an `n`-dimensional space lives at bit `n - 1 - j` of a
/// per-level vector, so dimension 0 is the most significant bit.
#[inline]
pub(crate) fn dimension_bit(dimensions: usize, dimension: usize) -> usize {
    dimensions - 1 - dimension
}

/// Precomputed per-level free-dimension masks and index-slice offsets.
#[derive(Clone, Debug)]
pub struct HilbertIndexMasks {
    masks: Vec<BitVector>,
    cardinalities: Vec<usize>,
    bits_below: Vec<usize>,
}

impl HilbertIndexMasks {
    /// Derives the masks for a spec.
    pub fn new(spec: &MultiDimensionalSpec) -> Self {
        let n = spec.dimensions();
        let depth = spec.max_bits_per_dimension();
        let mut masks = Vec::with_capacity(depth);
        let mut cardinalities = Vec::with_capacity(depth);
        for level in 0..depth {
            let mut mask = BitVector::with_size(n);
            for (j, bits) in spec.bits_per_dimension().iter().enumerate() {
                if *bits > level {
                    mask.set(dimension_bit(n, j));
                }
            }
            cardinalities.push(mask.cardinality());
            masks.push(mask);
        }
        // bits_below[level] = index bits contributed by all levels below it.
        let mut bits_below = Vec::with_capacity(depth + 1);
        let mut acc = 0;
        bits_below.push(0);
        for card in &cardinalities {
            acc += card;
            bits_below.push(acc);
        }
        debug_assert_eq!(acc, spec.sum_bits_per_dimension());
        HilbertIndexMasks { masks, cardinalities, bits_below }
    }

    /// Number of levels, `max_bits_per_dimension`.
    pub fn levels(&self) -> usize {
        self.masks.len()
    }

    /// Free-dimension mask for a level, unrotated.
    pub fn mask(&self, level: usize) -> &BitVector {
        &self.masks[level]
    }

    /// Number of live dimensions at a level.
    pub fn cardinality(&self, level: usize) -> usize {
        self.cardinalities[level]
    }

    /// Number of index bits contributed by all levels strictly below
    /// `level`; the slice for `level` is
    /// `[bits_below(level), bits_below(level) + cardinality(level))`.
    pub fn bits_below(&self, level: usize) -> usize {
        self.bits_below[level]
    }
}
