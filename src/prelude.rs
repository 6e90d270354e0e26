//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from the crate.
//! Users can import everything they need with:
//!
//! ```
//! use chilbert::prelude::*;
//! ```

pub use crate::bit_vector::BitVector;
pub use crate::builder::{
    BacktrackingQueryBuilder, FilteredIndexRange, Query, QueryBuilder, QueryRangeVisitor,
    RangeList,
};
pub use crate::content::{Content, IndexRange};
pub use crate::curve::{CompactHilbertCurve, SpaceFillingCurve, SpaceVisitor};
pub use crate::error::Error;
pub use crate::masks::HilbertIndexMasks;
pub use crate::region::{
    Assessment, FilterCombiner, ListConcatCombiner, PlainFilterCombiner, RegionInspector,
    SelectiveFilter, SimpleRegionInspector, SpatialRelation,
};
pub use crate::space::{MultiDimensionalSpec, Pow2LengthBitSetRange};
