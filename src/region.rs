//! Policy contracts classifying curve-tree nodes against a query region,
//! and the filter combiners used when accepted ranges are merged.

use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::builder::FilteredIndexRange;
use crate::content::{Content, IndexRange};
use crate::space::{Pow2LengthBitSetRange, orthotope_content};

/// How a curve-tree node relates to the query region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpatialRelation {
    /// Every point of the node is wanted.
    Covered,
    /// Some points are wanted, some are not; only descending can tell.
    Overlaps,
    /// No point of the node is wanted.
    Disjoint,
}

/// The classification of one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Assessment<F, T> {
    /// No shared points. `estimate` is an upper bound on the data hiding in
    /// the skipped interval, used for gap-merge decisions; zero only when
    /// the interval is provably empty of data.
    Disjoint {
        /// Upper bound on the skipped data.
        estimate: T,
    },
    /// Undecidable at this granularity; forces a descent.
    Overlaps,
    /// Every point is wanted; `filter` is valid for exactly this node's
    /// index interval.
    Covered {
        /// Residual filter for the interval.
        filter: F,
        /// True when the filter admits points outside the query region.
        potential_over_selectivity: bool,
    },
}

impl<F, T> Assessment<F, T> {
    /// The bare relation, without the payload.
    pub fn relation(&self) -> SpatialRelation {
        match self {
            Assessment::Disjoint { .. } => SpatialRelation::Disjoint,
            Assessment::Overlaps => SpatialRelation::Overlaps,
            Assessment::Covered { .. } => SpatialRelation::Covered,
        }
    }
}

/// Classifies curve-tree nodes against a query region.
pub trait RegionInspector<T: Content, F> {
    /// Classifies the node holding `index_range` whose spatial footprint is
    /// `orthotope` (one aligned interval per dimension).
    fn assess(
        &mut self,
        index_range: &Pow2LengthBitSetRange,
        orthotope: &[Pow2LengthBitSetRange],
    ) -> Assessment<F, T>;
}

/// A filter together with its precision flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectiveFilter<F> {
    filter: F,
    potential_over_selectivity: bool,
}

impl<F> SelectiveFilter<F> {
    /// Bundles a filter with its precision flag.
    pub fn of(filter: F, potential_over_selectivity: bool) -> Self {
        SelectiveFilter { filter, potential_over_selectivity }
    }

    /// The filter itself.
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// True when the filter admits points outside the query region.
    pub fn is_potential_over_selectivity(&self) -> bool {
        self.potential_over_selectivity
    }

    /// Splits into the two parts.
    pub fn into_parts(self) -> (F, bool) {
        (self.filter, self.potential_over_selectivity)
    }
}

/// Merges the filters of two accepted ranges when the gap between them is
/// folded away. `gap_estimate` is zero only when the ranges are numerically
/// adjacent.
pub trait FilterCombiner<T: Content, F> {
    /// Produces one filter valid for the union of the two ranges and the
    /// folded gap.
    fn combine(
        &mut self,
        lower: &FilteredIndexRange<T, F>,
        higher: &FilteredIndexRange<T, F>,
        gap_estimate: &T,
    ) -> SelectiveFilter<F>;
}

/// The trivial combiner: every combination yields the same constant filter,
/// never over-selective. Useful when the residual filtering happens outside
/// the index anyway.
#[derive(Clone, Debug)]
pub struct PlainFilterCombiner<F: Clone> {
    filter: F,
}

impl<F: Clone> PlainFilterCombiner<F> {
    /// Creates a combiner always yielding `filter`.
    pub fn new(filter: F) -> Self {
        PlainFilterCombiner { filter }
    }
}

impl<T: Content, F: Clone> FilterCombiner<T, F> for PlainFilterCombiner<F> {
    fn combine(
        &mut self,
        _lower: &FilteredIndexRange<T, F>,
        _higher: &FilteredIndexRange<T, F>,
        _gap_estimate: &T,
    ) -> SelectiveFilter<F> {
        SelectiveFilter::of(self.filter.clone(), false)
    }
}

/// Combiner for filters that are lists of index ranges: concatenates the two
/// lists, and past a configured length degrades to one coarse spanning range
/// with the over-selectivity flag raised. The degrade is the documented soft
/// path, not an error.
#[derive(Clone, Debug)]
pub struct ListConcatCombiner {
    threshold: usize,
}

impl ListConcatCombiner {
    /// Creates a combiner degrading past `threshold` ranges.
    ///
    /// # Panics
    /// Panics if `threshold` is zero.
    pub fn new(threshold: usize) -> Self {
        assert!(threshold > 0, "the range-list threshold must be positive");
        ListConcatCombiner { threshold }
    }
}

impl<T: Content> FilterCombiner<T, Vec<IndexRange<T>>> for ListConcatCombiner {
    fn combine(
        &mut self,
        lower: &FilteredIndexRange<T, Vec<IndexRange<T>>>,
        higher: &FilteredIndexRange<T, Vec<IndexRange<T>>>,
        _gap_estimate: &T,
    ) -> SelectiveFilter<Vec<IndexRange<T>>> {
        let mut list = lower.filter().clone();
        list.extend(higher.filter().iter().cloned());
        if list.len() > self.threshold {
            let first = list.first().expect("concatenation of non-empty filters");
            let last = list.last().expect("concatenation of non-empty filters");
            let coarse = first.span(last);
            trace!(
                ranges = list.len(),
                threshold = self.threshold,
                "filter range list over threshold; degrading to one coarse range"
            );
            SelectiveFilter::of(vec![coarse], true)
        } else {
            SelectiveFilter::of(list, false)
        }
    }
}

/// The reference inspector: exact geometry against a disjoint union of
/// axis-aligned boxes.
///
/// A node fully inside the region is covered with an exact filter; a node
/// sharing nothing is disjoint with the node's own content as the data
/// estimate; a partially overlapped node is normally undecided, but once its
/// content drops below `min_overlapping_content` further descent is not
/// worth it and the whole node is accepted with the over-selectivity flag
/// raised.
pub struct SimpleRegionInspector<T, F, G>
where
    T: Content,
    G: Fn(&IndexRange<T>) -> F,
{
    query_region: Vec<Vec<IndexRange<T>>>,
    min_overlapping_content: T,
    filter_factory: G,
    _filter: PhantomData<F>,
}

impl<T, F, G> SimpleRegionInspector<T, F, G>
where
    T: Content,
    G: Fn(&IndexRange<T>) -> F,
{
    /// Creates an inspector for a region given as a disjoint union of boxes,
    /// each box one coordinate range per dimension. `filter_factory` builds
    /// the filter attached to an accepted index interval.
    pub fn new(
        query_region: Vec<Vec<IndexRange<T>>>,
        min_overlapping_content: T,
        filter_factory: G,
    ) -> Self {
        SimpleRegionInspector {
            query_region,
            min_overlapping_content,
            filter_factory,
            _filter: PhantomData,
        }
    }

    /// Total overlap between the orthotope and the query region.
    fn overlapping_content(&self, orthotope: &[Pow2LengthBitSetRange]) -> T {
        let mut total = T::zero();
        for query_box in &self.query_region {
            assert_eq!(
                query_box.len(),
                orthotope.len(),
                "query box dimensionality does not match the space"
            );
            let mut piece = T::pow2(0);
            for (dim, wanted) in orthotope.iter().zip(query_box) {
                let shared = dim.to_range::<T>().overlap_length(wanted);
                if shared.is_zero() {
                    piece = T::zero();
                    break;
                }
                piece = piece.mul(&shared);
            }
            total = total.add(&piece);
        }
        total
    }
}

impl<T, F, G> fmt::Debug for SimpleRegionInspector<T, F, G>
where
    T: Content,
    G: Fn(&IndexRange<T>) -> F,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleRegionInspector")
            .field("query_region", &self.query_region)
            .field("min_overlapping_content", &self.min_overlapping_content)
            .finish_non_exhaustive()
    }
}

impl<T, F, G> RegionInspector<T, F> for SimpleRegionInspector<T, F, G>
where
    T: Content,
    G: Fn(&IndexRange<T>) -> F,
{
    fn assess(
        &mut self,
        index_range: &Pow2LengthBitSetRange,
        orthotope: &[Pow2LengthBitSetRange],
    ) -> Assessment<F, T> {
        let content = orthotope_content::<T>(orthotope);
        let overlap = self.overlapping_content(orthotope);
        if overlap.is_zero() {
            // Nothing wanted here; all of it may still hold data.
            return Assessment::Disjoint { estimate: content };
        }
        if overlap == content {
            let filter = (self.filter_factory)(&index_range.to_range::<T>());
            return Assessment::Covered { filter, potential_over_selectivity: false };
        }
        if content < self.min_overlapping_content {
            let filter = (self.filter_factory)(&index_range.to_range::<T>());
            return Assessment::Covered { filter, potential_over_selectivity: true };
        }
        Assessment::Overlaps
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Assessment, ListConcatCombiner, PlainFilterCombiner, RegionInspector, SelectiveFilter,
        SimpleRegionInspector, SpatialRelation,
    };
    use crate::bit_vector::BitVector;
    use crate::builder::FilteredIndexRange;
    use crate::content::IndexRange;
    use crate::region::FilterCombiner;
    use crate::space::Pow2LengthBitSetRange;

    /// One-dimensional inspector over `[1, 10)` in a 9-bit universe, as in
    /// the worked query example.
    fn example_inspector()
    -> SimpleRegionInspector<u64, IndexRange<u64>, impl Fn(&IndexRange<u64>) -> IndexRange<u64>>
    {
        SimpleRegionInspector::new(
            vec![vec![IndexRange::of(1u64, 10)]],
            64,
            |range: &IndexRange<u64>| range.clone(),
        )
    }

    fn node(start: u64, level: usize) -> Pow2LengthBitSetRange {
        Pow2LengthBitSetRange::new(BitVector::from_value(start, 9), level)
    }

    #[test]
    fn test_full_overlap_is_covered_exactly() {
        let mut inspector = example_inspector();
        // The level-1 node [8, 10) sits entirely inside [1, 10).
        let n = node(8, 1);
        let assessment = inspector.assess(&n, std::slice::from_ref(&n));
        match assessment {
            Assessment::Covered { filter, potential_over_selectivity } => {
                assert_eq!(filter, IndexRange::of(8, 10));
                assert!(!potential_over_selectivity, "exact coverage is not over-selective");
            }
            other => panic!("expected Covered, got {other:?}"),
        }
    }

    #[test]
    fn test_no_overlap_is_disjoint_with_content_estimate() {
        let mut inspector = example_inspector();
        let n = node(32, 5);
        let assessment = inspector.assess(&n, std::slice::from_ref(&n));
        assert_eq!(assessment, Assessment::Disjoint { estimate: 32 });
    }

    #[test]
    fn test_large_partial_overlap_forces_descent() {
        let mut inspector = example_inspector();
        // [0, 64) partially overlaps and is not below the threshold.
        let n = node(0, 6);
        let assessment = inspector.assess(&n, std::slice::from_ref(&n));
        assert_eq!(assessment.relation(), SpatialRelation::Overlaps);
    }

    #[test]
    fn test_small_partial_overlap_accepts_with_over_selectivity() {
        let mut inspector = example_inspector();
        // [0, 32) partially overlaps and its content 32 is below 64.
        let n = node(0, 5);
        match inspector.assess(&n, std::slice::from_ref(&n)) {
            Assessment::Covered { filter, potential_over_selectivity } => {
                assert_eq!(filter, IndexRange::of(0, 32));
                assert!(potential_over_selectivity);
            }
            other => panic!("expected Covered, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_dimensional_overlap_is_a_volume() {
        // Region x in [0, 2), y in [0, 2) over a 2x2-bit space; node is the
        // whole space, overlap volume 4 of content 16.
        let mut inspector = SimpleRegionInspector::new(
            vec![vec![IndexRange::of(0u64, 2), IndexRange::of(0u64, 2)]],
            1,
            |range: &IndexRange<u64>| range.clone(),
        );
        let dims = [
            Pow2LengthBitSetRange::new(BitVector::with_size(2), 2),
            Pow2LengthBitSetRange::new(BitVector::with_size(2), 2),
        ];
        let index_range = Pow2LengthBitSetRange::new(BitVector::with_size(4), 4);
        assert_eq!(
            inspector.assess(&index_range, &dims).relation(),
            SpatialRelation::Overlaps
        );
    }

    #[test]
    fn test_disjoint_union_of_boxes_sums_overlap() {
        // Two disjoint one-dimensional boxes covering [0, 2) and [2, 4)
        // together cover the node [0, 4) exactly.
        let mut inspector = SimpleRegionInspector::new(
            vec![vec![IndexRange::of(0u64, 2)], vec![IndexRange::of(2u64, 4)]],
            1,
            |range: &IndexRange<u64>| range.clone(),
        );
        let n = Pow2LengthBitSetRange::new(BitVector::with_size(4), 2);
        match inspector.assess(&n, std::slice::from_ref(&n)) {
            Assessment::Covered { potential_over_selectivity, .. } => {
                assert!(!potential_over_selectivity);
            }
            other => panic!("expected Covered, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_combiner_is_constant() {
        let mut combiner = PlainFilterCombiner::new(0u8);
        let lower = FilteredIndexRange::new(IndexRange::of(0u64, 4), 7u8, true);
        let higher = FilteredIndexRange::new(IndexRange::of(8u64, 12), 9u8, false);
        let combined = combiner.combine(&lower, &higher, &4);
        assert_eq!(combined, SelectiveFilter::of(0u8, false));
    }

    #[test]
    fn test_list_concat_combiner_concatenates_below_threshold() {
        let mut combiner = ListConcatCombiner::new(3);
        let lower =
            FilteredIndexRange::new(IndexRange::of(0u64, 4), vec![IndexRange::of(0u64, 4)], false);
        let higher =
            FilteredIndexRange::new(IndexRange::of(8u64, 12), vec![IndexRange::of(8u64, 12)], false);
        let combined = combiner.combine(&lower, &higher, &4);
        assert!(!combined.is_potential_over_selectivity());
        assert_eq!(combined.filter().len(), 2);
    }

    #[test]
    fn test_list_concat_combiner_degrades_over_threshold() {
        let mut combiner = ListConcatCombiner::new(2);
        let lower = FilteredIndexRange::new(
            IndexRange::of(0u64, 8),
            vec![IndexRange::of(0u64, 2), IndexRange::of(4u64, 8)],
            false,
        );
        let higher =
            FilteredIndexRange::new(IndexRange::of(16u64, 20), vec![IndexRange::of(16u64, 20)], false);
        let combined = combiner.combine(&lower, &higher, &8);
        assert!(combined.is_potential_over_selectivity(), "degrade raises the flag");
        assert_eq!(combined.filter().as_slice(), &[IndexRange::of(0u64, 20)]);
    }
}
