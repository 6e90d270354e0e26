//! Building bounded range queries out of a curve traversal.
//!
//! The traversal hands nodes to a [`QueryBuilder`] in strictly increasing
//! index order; the builder keeps an ordered list of accepted ranges and a
//! capped min-heap of merge candidates keyed by the vacuum preceding each
//! range. Whenever the configured range bound would be exceeded, the
//! candidate with the smallest preceding gap is folded into its predecessor,
//! so memory stays O(max ranges) however large the space is.

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::marker::PhantomData;

use tracing::{debug, trace};

use crate::bit_vector::BitVector;
use crate::content::{Content, IndexRange};
use crate::curve::SpaceVisitor;
use crate::region::{Assessment, FilterCombiner, RegionInspector};
use crate::space::{MultiDimensionalSpec, Pow2LengthBitSetRange};

/// One output unit: an index interval, the residual filter to apply inside
/// it, and whether that filter may admit unwanted points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilteredIndexRange<T, F> {
    index_range: IndexRange<T>,
    filter: F,
    potential_over_selectivity: bool,
}

impl<T: Content, F> FilteredIndexRange<T, F> {
    /// Bundles an interval with its filter.
    pub fn new(index_range: IndexRange<T>, filter: F, potential_over_selectivity: bool) -> Self {
        FilteredIndexRange { index_range, filter, potential_over_selectivity }
    }

    /// The interval to scan.
    pub fn index_range(&self) -> &IndexRange<T> {
        &self.index_range
    }

    /// The residual filter, valid for exactly this interval.
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// True when the filter may admit points outside the query region.
    pub fn is_potential_over_selectivity(&self) -> bool {
        self.potential_over_selectivity
    }
}

/// An immutable, random-access query plan: strictly increasing,
/// non-overlapping filtered index ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query<T, F> {
    filtered_index_ranges: Vec<FilteredIndexRange<T, F>>,
}

impl<T: Content, F> Query<T, F> {
    /// Wraps a finished range list.
    ///
    /// # Panics
    /// Panics if the ranges are not strictly increasing and non-overlapping.
    pub fn of(filtered_index_ranges: Vec<FilteredIndexRange<T, F>>) -> Self {
        for pair in filtered_index_ranges.windows(2) {
            assert!(
                pair[0].index_range().end() <= pair[1].index_range().start(),
                "query ranges must be strictly increasing and non-overlapping"
            );
        }
        Query { filtered_index_ranges }
    }

    /// The ranges, in index order.
    pub fn filtered_index_ranges(&self) -> &[FilteredIndexRange<T, F>] {
        &self.filtered_index_ranges
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.filtered_index_ranges.len()
    }

    /// True iff the query selects nothing.
    pub fn is_empty(&self) -> bool {
        self.filtered_index_ranges.is_empty()
    }

    /// True iff any range may admit points outside the query region.
    pub fn is_potential_over_selectivity(&self) -> bool {
        self.filtered_index_ranges
            .iter()
            .any(FilteredIndexRange::is_potential_over_selectivity)
    }
}

/// Stable handle into a [`RangeList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handle(usize);

/// An ordered list with stable handles: O(1) tail append, handle
/// read/replace/remove, and predecessor lookup. Backed by a slab of linked
/// cells; a removed slot is recycled by later appends.
#[derive(Clone, Debug)]
pub struct RangeList<V> {
    cells: Vec<Option<Cell<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

#[derive(Clone, Debug)]
struct Cell<V> {
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<V> RangeList<V> {
    /// Creates an empty list.
    pub fn new() -> Self {
        RangeList { cells: Vec::new(), free: Vec::new(), head: None, tail: None, len: 0 }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True iff the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handle of the last element.
    pub fn tail(&self) -> Option<Handle> {
        self.tail.map(Handle)
    }

    /// Appends at the tail and returns the new element's handle.
    pub fn push_back(&mut self, value: V) -> Handle {
        let cell = Cell { value, prev: self.tail, next: None };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.cells[slot] = Some(cell);
                slot
            }
            None => {
                self.cells.push(Some(cell));
                self.cells.len() - 1
            }
        };
        match self.tail {
            Some(old) => {
                self.cell_mut(old).next = Some(slot);
            }
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
        Handle(slot)
    }

    /// Reads an element.
    ///
    /// # Panics
    /// Panics on a stale handle.
    pub fn get(&self, handle: Handle) -> &V {
        &self.cell(handle.0).value
    }

    /// Replaces an element in place, returning the old value.
    ///
    /// # Panics
    /// Panics on a stale handle.
    pub fn replace(&mut self, handle: Handle, value: V) -> V {
        std::mem::replace(&mut self.cell_mut(handle.0).value, value)
    }

    /// Handle of the element before `handle`.
    ///
    /// # Panics
    /// Panics on a stale handle.
    pub fn prev(&self, handle: Handle) -> Option<Handle> {
        self.cell(handle.0).prev.map(Handle)
    }

    /// Unlinks an element and returns its value; the handle becomes stale.
    ///
    /// # Panics
    /// Panics on a stale handle.
    pub fn remove(&mut self, handle: Handle) -> V {
        let slot = handle.0;
        let cell = self.cells[slot].take().unwrap_or_else(|| panic!("stale handle {slot}"));
        match cell.prev {
            Some(prev) => self.cell_mut(prev).next = cell.next,
            None => self.head = cell.next,
        }
        match cell.next {
            Some(next) => self.cell_mut(next).prev = cell.prev,
            None => self.tail = cell.prev,
        }
        self.free.push(slot);
        self.len -= 1;
        cell.value
    }

    /// Iterates the elements in list order.
    pub fn iter(&self) -> RangeListIter<'_, V> {
        RangeListIter { list: self, next: self.head }
    }

    fn cell(&self, slot: usize) -> &Cell<V> {
        self.cells[slot].as_ref().unwrap_or_else(|| panic!("stale handle {slot}"))
    }

    fn cell_mut(&mut self, slot: usize) -> &mut Cell<V> {
        self.cells[slot].as_mut().unwrap_or_else(|| panic!("stale handle {slot}"))
    }
}

impl<V> Default for RangeList<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// In-order iterator over a [`RangeList`].
#[derive(Debug)]
pub struct RangeListIter<'a, V> {
    list: &'a RangeList<V>,
    next: Option<usize>,
}

impl<'a, V> Iterator for RangeListIter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        let slot = self.next?;
        let cell = self.list.cell(slot);
        self.next = cell.next;
        Some(&cell.value)
    }
}

/// Consumes curve-tree nodes in strictly increasing index order and
/// produces a bounded [`Query`].
pub trait QueryBuilder<T: Content, F> {
    /// Handles one node; returns whether the traversal should descend.
    fn visit(
        &mut self,
        index_range: &Pow2LengthBitSetRange,
        orthotope: &[Pow2LengthBitSetRange],
    ) -> bool;

    /// Snapshots the finished query.
    fn get(&self) -> Query<T, F>;
}

/// A merge candidate: the vacuum preceding one non-first range. Ordered by
/// `(gap, seq)` so that equal gaps merge the earliest-appended range first,
/// keeping query plans deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
struct MergeCandidate<T> {
    gap: T,
    seq: u64,
    handle: Handle,
}

impl<T: Ord> PartialOrd for MergeCandidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for MergeCandidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gap.cmp(&other.gap).then_with(|| self.seq.cmp(&other.seq))
    }
}

/// The visitor-driven query builder with bounded output.
///
/// Holds at most `max_filtered_index_ranges` ranges at any time; the heap of
/// merge candidates stays strictly smaller. Instances are single-use and not
/// thread-safe; build one per query.
pub struct BacktrackingQueryBuilder<T, F, R, C>
where
    T: Content,
    R: RegionInspector<T, F>,
    C: FilterCombiner<T, F>,
{
    inspector: R,
    combiner: C,
    max_filtered_index_ranges: usize,
    always_remove_vacuum: bool,
    ranges: RangeList<FilteredIndexRange<T, F>>,
    heap: BinaryHeap<Reverse<MergeCandidate<T>>>,
    current_gap: T,
    expected_start: Option<T>,
    seq: u64,
}

impl<T, F, R, C> BacktrackingQueryBuilder<T, F, R, C>
where
    T: Content,
    F: Clone,
    R: RegionInspector<T, F>,
    C: FilterCombiner<T, F>,
{
    /// Creates a builder producing at most `max_filtered_index_ranges`
    /// ranges.
    ///
    /// # Panics
    /// Panics if `max_filtered_index_ranges` is zero.
    pub fn new(
        inspector: R,
        combiner: C,
        max_filtered_index_ranges: usize,
        always_remove_vacuum: bool,
    ) -> Self {
        assert!(max_filtered_index_ranges > 0, "at least one output range is required");
        BacktrackingQueryBuilder {
            inspector,
            combiner,
            max_filtered_index_ranges,
            always_remove_vacuum,
            ranges: RangeList::new(),
            heap: BinaryHeap::new(),
            current_gap: T::zero(),
            expected_start: None,
            seq: 0,
        }
    }

    /// A closed node must start exactly where the previous closed node
    /// ended; anything else means the traversal contract was broken.
    fn check_closed_in_order(&mut self, range: &IndexRange<T>) {
        if let Some(expected) = &self.expected_start {
            assert!(
                range.start() == expected,
                "closed node starts at {:?}, expected {:?}: traversal out of order",
                range.start(),
                expected
            );
        }
        self.expected_start = Some(range.end().clone());
    }

    fn process_covered(&mut self, range: IndexRange<T>, filter: F, over_selectivity: bool) {
        let candidate = FilteredIndexRange::new(range, filter, over_selectivity);
        if self.always_remove_vacuum && self.current_gap.is_zero() {
            if let Some(tail) = self.ranges.tail() {
                // Numerically adjacent to the previous range: extend it
                // instead of opening a new one.
                let previous = self.ranges.get(tail);
                let combined = self.combiner.combine(previous, &candidate, &T::zero());
                let (filter, combiner_flag) = combined.into_parts();
                let merged = FilteredIndexRange::new(
                    IndexRange::of(
                        previous.index_range().start().clone(),
                        candidate.index_range().end().clone(),
                    ),
                    filter,
                    previous.is_potential_over_selectivity()
                        || candidate.is_potential_over_selectivity()
                        || combiner_flag,
                );
                trace!("folding adjacent covered node into the previous range");
                drop(self.ranges.replace(tail, merged));
                return;
            }
        }
        let had_predecessor = !self.ranges.is_empty();
        let handle = self.ranges.push_back(candidate);
        if had_predecessor {
            let gap = std::mem::replace(&mut self.current_gap, T::zero());
            self.seq += 1;
            self.heap.push(Reverse(MergeCandidate { gap, seq: self.seq, handle }));
            if self.heap.len() >= self.max_filtered_index_ranges {
                self.merge_cheapest_gap();
            }
        } else {
            self.current_gap = T::zero();
        }
    }

    /// Folds the range whose preceding vacuum is smallest into its list
    /// predecessor, keeping the output bound.
    fn merge_cheapest_gap(&mut self) {
        let Reverse(candidate) =
            self.heap.pop().expect("a merge is only requested with a populated heap");
        let predecessor = self
            .ranges
            .prev(candidate.handle)
            .expect("merge candidates never reference the first range");
        let removed = self.ranges.remove(candidate.handle);
        let previous = self.ranges.get(predecessor);
        let combined = self.combiner.combine(previous, &removed, &candidate.gap);
        let (filter, combiner_flag) = combined.into_parts();
        let merged = FilteredIndexRange::new(
            IndexRange::of(
                previous.index_range().start().clone(),
                removed.index_range().end().clone(),
            ),
            filter,
            previous.is_potential_over_selectivity()
                || removed.is_potential_over_selectivity()
                || combiner_flag,
        );
        trace!(gap = ?candidate.gap, "merging the cheapest gap to hold the range bound");
        drop(self.ranges.replace(predecessor, merged));
    }
}

impl<T, F, R, C> QueryBuilder<T, F> for BacktrackingQueryBuilder<T, F, R, C>
where
    T: Content,
    F: Clone,
    R: RegionInspector<T, F>,
    C: FilterCombiner<T, F>,
{
    fn visit(
        &mut self,
        index_range: &Pow2LengthBitSetRange,
        orthotope: &[Pow2LengthBitSetRange],
    ) -> bool {
        match self.inspector.assess(index_range, orthotope) {
            Assessment::Overlaps => true,
            Assessment::Disjoint { estimate } => {
                let range = index_range.to_range::<T>();
                self.check_closed_in_order(&range);
                if !self.ranges.is_empty() {
                    self.current_gap = self.current_gap.add(&estimate);
                }
                false
            }
            Assessment::Covered { filter, potential_over_selectivity } => {
                let range = index_range.to_range::<T>();
                self.check_closed_in_order(&range);
                self.process_covered(range, filter, potential_over_selectivity);
                false
            }
        }
    }

    fn get(&self) -> Query<T, F> {
        let ranges: Vec<FilteredIndexRange<T, F>> = self.ranges.iter().cloned().collect();
        let query = Query::of(ranges);
        debug!(
            ranges = query.len(),
            over_selective = query.is_potential_over_selectivity(),
            "query built"
        );
        query
    }
}

impl<T, F, R, C> fmt::Debug for BacktrackingQueryBuilder<T, F, R, C>
where
    T: Content,
    R: RegionInspector<T, F>,
    C: FilterCombiner<T, F>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BacktrackingQueryBuilder")
            .field("max_filtered_index_ranges", &self.max_filtered_index_ranges)
            .field("always_remove_vacuum", &self.always_remove_vacuum)
            .field("ranges", &self.ranges.len())
            .field("pending_merges", &self.heap.len())
            .finish_non_exhaustive()
    }
}

/// Bridges the curve traversal to a [`QueryBuilder`]: each visited node's
/// raw `(level, index, point)` becomes an index interval and an orthotope.
pub struct QueryRangeVisitor<'a, T, F, B>
where
    T: Content,
    B: QueryBuilder<T, F>,
{
    spec: MultiDimensionalSpec,
    builder: &'a mut B,
    _marker: PhantomData<(T, F)>,
}

impl<'a, T, F, B> QueryRangeVisitor<'a, T, F, B>
where
    T: Content,
    B: QueryBuilder<T, F>,
{
    /// Creates the bridge for one traversal.
    pub fn new(spec: MultiDimensionalSpec, builder: &'a mut B) -> Self {
        QueryRangeVisitor { spec, builder, _marker: PhantomData }
    }
}

impl<T, F, B> fmt::Debug for QueryRangeVisitor<'_, T, F, B>
where
    T: Content,
    B: QueryBuilder<T, F>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRangeVisitor").field("spec", &self.spec).finish_non_exhaustive()
    }
}

impl<T, F, B> SpaceVisitor for QueryRangeVisitor<'_, T, F, B>
where
    T: Content,
    B: QueryBuilder<T, F>,
{
    fn visit(&mut self, level: usize, index: &BitVector, point: &[BitVector]) -> bool {
        let unresolved: usize =
            self.spec.bits_per_dimension().iter().map(|bits| level.min(*bits)).sum();
        let index_range = Pow2LengthBitSetRange::new(index.clone(), unresolved);
        let orthotope: Vec<Pow2LengthBitSetRange> = point
            .iter()
            .zip(self.spec.bits_per_dimension())
            .map(|(p, bits)| Pow2LengthBitSetRange::new(p.clone(), level.min(*bits)))
            .collect();
        self.builder.visit(&index_range, &orthotope)
    }
}
