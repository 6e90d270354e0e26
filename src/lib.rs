//! # chilbert - Compact Hilbert Curve Indexing
//!
//! A Rust library mapping multidimensional points to and from a scalar index
//! on a compact Hilbert space-filling curve, and building bounded-size range
//! queries over that index for order-preserving key-value stores.
//!
//! ## Features
//!
//! - **Compact indexes**: the index width is the sum of the per-dimension
//!   bit depths, not `dimensions * max_depth` - dimensions of different
//!   precision waste no key bytes
//! - **Spatial locality**: points close in space tend to be close in key
//!   order, so box queries touch few index ranges
//! - **Bounded query plans**: an arbitrary query region becomes at most a
//!   configured number of index intervals, merged greedily by the amount of
//!   irrelevant data each merge would scan
//! - **Embeddable**: no storage engine, no I/O - just the math and the
//!   planning; keys serialize as fixed-width big-endian bytes
//!
//! ## Quick Start
//!
//! ```rust
//! use chilbert::prelude::*;
//!
//! // A 4x4 space: two dimensions of two bits each.
//! let spec = MultiDimensionalSpec::new(vec![2, 2]);
//! let mut curve = CompactHilbertCurve::new(spec.clone());
//!
//! // Map a point to its curve index and back.
//! let point = vec![BitVector::from_value(1, 2), BitVector::from_value(2, 2)];
//! let mut index = BitVector::with_size(spec.sum_bits_per_dimension());
//! curve.index(&point, 0, &mut index);
//! let mut back = vec![BitVector::with_size(2), BitVector::with_size(2)];
//! curve.index_inverse(&index, &mut back);
//! assert_eq!(back, point);
//!
//! // Plan a scan over the box x in [0, 2), y in [2, 4).
//! let region = vec![vec![IndexRange::of(0u64, 2), IndexRange::of(2u64, 4)]];
//! let inspector = SimpleRegionInspector::new(region, 1, |_r: &IndexRange<u64>| ());
//! let combiner = PlainFilterCombiner::new(());
//! let mut builder = BacktrackingQueryBuilder::new(inspector, combiner, 3, true);
//! let mut visitor = QueryRangeVisitor::new(spec, &mut builder);
//! curve.accept(&mut visitor);
//!
//! // That box is one contiguous stretch of the curve.
//! let query = builder.get();
//! assert_eq!(query.len(), 1);
//! let only = &query.filtered_index_ranges()[0];
//! assert_eq!((*only.index_range().start(), *only.index_range().end()), (4, 8));
//! ```
//!
//! ## How It Works
//!
//! The curve advances one Gray-code step per sub-hypercube, keeping a
//! direction and an entry vertex per recursion level; per-level masks track
//! which dimensions still contribute bits, which is what makes the index
//! compact. Query planning walks the curve's recursion tree in index order,
//! classifies each node against the query region, and folds accepted ranges
//! together - smallest intervening vacuum first - whenever the configured
//! plan size would be exceeded.
//!
//! Curve and builder instances reuse internal scratch buffers, so they take
//! `&mut self` and must not be shared across concurrent queries.

pub mod bit_vector;
pub mod builder;
pub mod content;
pub mod curve;
pub mod error;
pub mod masks;
pub mod prelude;
pub mod region;
pub mod space;


pub use bit_vector::BitVector;
pub use builder::{
    BacktrackingQueryBuilder, FilteredIndexRange, Query, QueryBuilder, QueryRangeVisitor,
};
pub use content::{Content, IndexRange};
pub use curve::{CompactHilbertCurve, SpaceFillingCurve, SpaceVisitor};
pub use error::{Error, Result};
pub use masks::HilbertIndexMasks;
pub use region::{
    Assessment, FilterCombiner, ListConcatCombiner, PlainFilterCombiner, RegionInspector,
    SelectiveFilter, SimpleRegionInspector, SpatialRelation,
};
pub use space::{MultiDimensionalSpec, Pow2LengthBitSetRange};
