//! The compact Hilbert curve: point to index, index to point, and the
//! pruned traversal of the curve's recursion tree.
//!
//! The index uses the minimum bit count (the sum of the per-dimension
//! depths) rather than `dimensions * max_depth` bits. Levels are processed
//! from the most significant down; at each one the curve keeps a direction
//! `d`, an entry vertex `e` (one bit per dimension) and the level's live
//! dimension mask, and moves one Gray-code step per sub-hypercube. Scratch
//! vectors are reused across levels, so every operation takes `&mut self`
//! and a curve must not be shared across concurrent queries.

use crate::bit_vector::BitVector;
use crate::masks::{HilbertIndexMasks, dimension_bit};
use crate::space::MultiDimensionalSpec;

/// A visitor driving the pruned traversal of [`SpaceFillingCurve::accept`].
///
/// `visit` is called once per recursion-tree node, in strictly increasing
/// index order. `level` counts the levels still unresolved below the node:
/// the node's index interval is `[index, index + 2^b)` where `b` is the
/// number of index bits contributed by those levels, and `point` holds the
/// per-dimension coordinate prefixes (bits below `level` are zero). The
/// borrowed arguments are invalidated when `visit` returns; clone to retain.
/// Returning `true` descends into the node's children; returning `false`
/// moves on to the next sibling.
pub trait SpaceVisitor {
    /// Classifies one node; returns whether to descend.
    fn visit(&mut self, level: usize, index: &BitVector, point: &[BitVector]) -> bool;
}

/// A bijective, order-preserving mapping between multidimensional points
/// and scalar indexes, with a visitor-driven tree traversal.
pub trait SpaceFillingCurve {
    /// The shape of the space being filled.
    fn spec(&self) -> &MultiDimensionalSpec;

    /// Computes the index of `point` into `index`, resolving levels down to
    /// `min_level`; bits below the `min_level` slice are left zero. Pass
    /// `min_level = 0` for the full index.
    fn index(&mut self, point: &[BitVector], min_level: usize, index: &mut BitVector);

    /// Recovers the unique point whose full index is `index`.
    fn index_inverse(&mut self, index: &BitVector, point: &mut [BitVector]);

    /// Walks the curve's recursion tree depth first, in strictly increasing
    /// index order, descending only where the visitor asks to.
    fn accept<V: SpaceVisitor>(&mut self, visitor: &mut V);
}

/// One level of saved traversal state: the direction and entry vertex on
/// entry to the level, and the child rank currently being explored.
#[derive(Debug)]
struct Frame {
    d: usize,
    e: BitVector,
    rank: BitVector,
}

/// The compact Hilbert curve over a [`MultiDimensionalSpec`].
#[derive(Debug)]
pub struct CompactHilbertCurve {
    spec: MultiDimensionalSpec,
    masks: HilbertIndexMasks,
    // Scratch, reused across levels and calls.
    mu: BitVector,
    w: BitVector,
    l: BitVector,
    e: BitVector,
    known: BitVector,
    entry: BitVector,
    rank: Vec<BitVector>,
}

impl CompactHilbertCurve {
    /// Creates a curve for the given spec.
    pub fn new(spec: MultiDimensionalSpec) -> Self {
        let masks = HilbertIndexMasks::new(&spec);
        let n = spec.dimensions();
        let rank = (0..masks.levels())
            .map(|level| BitVector::with_size(masks.cardinality(level)))
            .collect();
        CompactHilbertCurve {
            spec,
            masks,
            mu: BitVector::with_size(n),
            w: BitVector::with_size(n),
            l: BitVector::with_size(n),
            e: BitVector::with_size(n),
            known: BitVector::with_size(n),
            entry: BitVector::with_size(n),
            rank,
        }
    }

    /// The per-level masks derived from the spec.
    pub fn masks(&self) -> &HilbertIndexMasks {
        &self.masks
    }

    fn check_point(&self, point: &[BitVector]) {
        assert_eq!(
            point.len(),
            self.spec.dimensions(),
            "point dimensionality does not match the spec"
        );
        for (j, (p, bits)) in point.iter().zip(self.spec.bits_per_dimension()).enumerate() {
            assert_eq!(p.size(), *bits, "dimension {j} has the wrong bit depth");
        }
    }

    /// Rotated live mask for `level` under direction `d`, left in `self.mu`.
    fn load_mask(&mut self, level: usize, d: usize) {
        self.mu.copy_from(self.masks.mask(level));
        self.mu.rotate(d as isize);
    }

    /// Applies one level's state update: `d += lowest_different_bit(w) + 1`
    /// (mod n) and `e ^= rotate_left(entry_vertex(w), d)`, reading `w` from
    /// scratch and updating `e` in place.
    fn update_state(&mut self, d: usize) -> usize {
        let n = self.spec.dimensions();
        self.entry.copy_from(&self.w);
        self.entry.smaller_even_and_gray_code();
        self.entry.rotate(-(d as isize));
        self.e.xor(&self.entry);
        (d + self.w.lowest_different_bit() + 1) % n
    }

    /// Same update against a caller-held entry vertex (traversal frames).
    fn child_state(&mut self, d: usize, e: &BitVector) -> (usize, BitVector) {
        let n = self.spec.dimensions();
        self.entry.copy_from(&self.w);
        self.entry.smaller_even_and_gray_code();
        self.entry.rotate(-(d as isize));
        let mut e_child = e.clone();
        e_child.xor(&self.entry);
        ((d + self.w.lowest_different_bit() + 1) % n, e_child)
    }

    /// Reconstructs into `self.w` and `self.l` the child of a node with
    /// state `(d, e)` selected by `rank` at `level`: `w` is the Gray-code
    /// predecessor count within the node, `l` the per-dimension bits in
    /// original coordinates.
    fn child_bits(&mut self, level: usize, d: usize, e: &BitVector, rank: &BitVector) {
        self.load_mask(level, d);
        self.known.copy_from(e);
        self.known.rotate(d as isize);
        self.known.and_not(&self.mu);
        self.w.gray_code_rank_inverse(&self.mu, &self.known, rank);
        self.l.copy_from(&self.w);
        self.l.gray_code();
        self.l.rotate(-(d as isize));
        self.l.xor(e);
    }
}

impl SpaceFillingCurve for CompactHilbertCurve {
    fn spec(&self) -> &MultiDimensionalSpec {
        &self.spec
    }

    fn index(&mut self, point: &[BitVector], min_level: usize, index: &mut BitVector) {
        self.check_point(point);
        assert_eq!(
            index.size(),
            self.spec.sum_bits_per_dimension(),
            "index width does not match the spec"
        );
        let n = self.spec.dimensions();
        let depth = self.masks.levels();
        assert!(min_level <= depth, "min_level {min_level} exceeds the curve depth {depth}");
        index.clear();
        self.e.clear();
        let mut d = 0;
        for i in (min_level..depth).rev() {
            // One bit per live dimension, dimension 0 most significant.
            self.l.clear();
            for (j, bits) in self.spec.bits_per_dimension().iter().enumerate() {
                if *bits > i && point[j].get(i) {
                    self.l.set(dimension_bit(n, j));
                }
            }
            // Into the rotated frame of the current sub-hypercube.
            self.w.copy_from(&self.l);
            self.w.xor(&self.e);
            self.w.rotate(d as isize);
            self.w.gray_code_inverse();
            // Pack the live bits into this level's slice of the index.
            self.load_mask(i, d);
            let offset = self.masks.bits_below(i);
            let r = &mut self.rank[i];
            r.gray_code_rank(&self.mu, &self.w);
            index.copy_section_from(offset, r);
            d = self.update_state(d);
        }
    }

    fn index_inverse(&mut self, index: &BitVector, point: &mut [BitVector]) {
        self.check_point(point);
        assert_eq!(
            index.size(),
            self.spec.sum_bits_per_dimension(),
            "index width does not match the spec"
        );
        let n = self.spec.dimensions();
        let depth = self.masks.levels();
        for p in point.iter_mut() {
            p.clear();
        }
        self.e.clear();
        let mut d = 0;
        for i in (0..depth).rev() {
            let r = &mut self.rank[i];
            r.copy_from_section(index, self.masks.bits_below(i));
            // child_bits inlined against the owned entry vertex.
            self.load_mask(i, d);
            self.known.copy_from(&self.e);
            self.known.rotate(d as isize);
            self.known.and_not(&self.mu);
            self.w.gray_code_rank_inverse(&self.mu, &self.known, &self.rank[i]);
            self.l.copy_from(&self.w);
            self.l.gray_code();
            self.l.rotate(-(d as isize));
            self.l.xor(&self.e);
            for (j, bits) in self.spec.bits_per_dimension().iter().enumerate() {
                if *bits > i {
                    point[j].set_to(i, self.l.get(dimension_bit(n, j)));
                }
            }
            d = self.update_state(d);
        }
    }

    fn accept<V: SpaceVisitor>(&mut self, visitor: &mut V) {
        let depth = self.masks.levels();
        let n = self.spec.dimensions();
        let mut index = BitVector::with_size(self.spec.sum_bits_per_dimension());
        let mut point: Vec<BitVector> = self
            .spec
            .bits_per_dimension()
            .iter()
            .map(|bits| BitVector::with_size(*bits))
            .collect();
        // The root covers the whole space.
        if !visitor.visit(depth, &index, &point) || depth == 0 {
            return;
        }
        let mut stack: Vec<Frame> = Vec::with_capacity(depth);
        stack.push(Frame {
            d: 0,
            e: BitVector::with_size(n),
            rank: BitVector::with_size(self.masks.cardinality(depth - 1)),
        });
        loop {
            let level = depth - stack.len();
            let frame = stack.last().expect("traversal stack is non-empty");
            let (d, e) = (frame.d, frame.e.clone());
            self.child_bits(level, d, &e, &frame.rank);
            for (j, bits) in self.spec.bits_per_dimension().iter().enumerate() {
                if *bits > level {
                    point[j].set_to(level, self.l.get(dimension_bit(n, j)));
                }
            }
            index.copy_section_from(self.masks.bits_below(level), &frame.rank);
            let descend = visitor.visit(level, &index, &point);
            if descend && level > 0 {
                let (d_child, e_child) = self.child_state(d, &e);
                stack.push(Frame {
                    d: d_child,
                    e: e_child,
                    rank: BitVector::with_size(self.masks.cardinality(level - 1)),
                });
            } else {
                // Advance to the nearest unexplored sibling, unwinding
                // exhausted levels.
                loop {
                    let unwound = depth - stack.len();
                    let frame = stack.last_mut().expect("traversal stack is non-empty");
                    if frame.rank.increment() {
                        break;
                    }
                    let offset = self.masks.bits_below(unwound);
                    for b in 0..self.masks.cardinality(unwound) {
                        index.clear_bit(offset + b);
                    }
                    for (j, bits) in self.spec.bits_per_dimension().iter().enumerate() {
                        if *bits > unwound {
                            point[j].clear_bit(unwound);
                        }
                    }
                    drop(stack.pop());
                    if stack.is_empty() {
                        return;
                    }
                }
            }
        }
    }
}
