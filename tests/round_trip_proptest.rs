//! Property-based tests for the curve and query machinery using proptest.
//!
//! These verify the crate's core invariants over randomized inputs:
//! - Point/index mapping round trips in both directions
//! - Gray code involution and Gray-rank reconstruction
//! - Query plans honoring their range bound and ordering contract

use chilbert::prelude::*;
use proptest::prelude::*;

// Helper to build per-dimension bit depths: 1-4 dimensions, 0-5 bits each.
fn arbitrary_depths() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..6, 1..5)
}

fn low_mask(bits: usize) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_point_index_round_trip(depths in arbitrary_depths(), seed in any::<u64>()) {
        let spec = MultiDimensionalSpec::new(depths.clone());
        let mut curve = CompactHilbertCurve::new(spec.clone());
        let point: Vec<BitVector> = depths
            .iter()
            .enumerate()
            .map(|(j, bits)| {
                let coordinate = seed.rotate_left(7 * j as u32) & low_mask(*bits);
                BitVector::from_value(coordinate, *bits)
            })
            .collect();
        let mut index = BitVector::with_size(spec.sum_bits_per_dimension());
        curve.index(&point, 0, &mut index);
        let mut back: Vec<BitVector> =
            depths.iter().map(|bits| BitVector::with_size(*bits)).collect();
        curve.index_inverse(&index, &mut back);
        prop_assert_eq!(back, point);
    }

    #[test]
    fn prop_index_point_round_trip(depths in arbitrary_depths(), seed in any::<u64>()) {
        let spec = MultiDimensionalSpec::new(depths.clone());
        let mut curve = CompactHilbertCurve::new(spec.clone());
        let width = spec.sum_bits_per_dimension();
        let mut index = BitVector::with_size(width);
        index.copy_from_u64(seed & low_mask(width));
        let mut point: Vec<BitVector> =
            depths.iter().map(|bits| BitVector::with_size(*bits)).collect();
        curve.index_inverse(&index, &mut point);
        let mut again = BitVector::with_size(width);
        curve.index(&point, 0, &mut again);
        prop_assert_eq!(again, index);
    }

    #[test]
    fn prop_gray_code_involution(value in any::<u64>(), size in 1usize..=64) {
        let mut v = BitVector::from_value(value & low_mask(size), size);
        let original = v.clone();
        v.gray_code();
        v.gray_code_inverse();
        prop_assert_eq!(v, original);
    }

    #[test]
    fn prop_gray_rank_round_trip(mu_bits in any::<u16>(), w_bits in any::<u16>()) {
        let size = 16;
        let mu = BitVector::from_value(u64::from(mu_bits), size);
        let w = BitVector::from_value(u64::from(w_bits), size);
        // known = gray_code(w) with the free positions masked out.
        let mut known = w.clone();
        known.gray_code();
        known.and_not(&mu);
        let mut rank = BitVector::with_size(mu.cardinality());
        rank.gray_code_rank(&mu, &w);
        let mut restored = BitVector::with_size(size);
        restored.gray_code_rank_inverse(&mu, &known, &rank);
        prop_assert_eq!(restored, w);
    }

    #[test]
    fn prop_big_endian_round_trip(value in any::<u64>(), size in 1usize..=64) {
        let v = BitVector::from_value(value & low_mask(size), size);
        let bytes = v.to_big_endian_byte_array();
        prop_assert_eq!(bytes.len(), size.div_ceil(8));
        let mut back = BitVector::with_size(size);
        prop_assert!(back.copy_from_big_endian(&bytes).is_ok());
        prop_assert_eq!(back, v);
    }

    #[test]
    fn prop_query_respects_bound_and_order(
        x0 in 0u64..15,
        x_width in 1u64..8,
        y0 in 0u64..15,
        y_width in 1u64..8,
        max_ranges in 1usize..5,
        always_remove_vacuum in any::<bool>(),
    ) {
        let x1 = (x0 + x_width).min(16);
        let y1 = (y0 + y_width).min(16);
        let spec = MultiDimensionalSpec::new(vec![4, 4]);
        let mut curve = CompactHilbertCurve::new(spec.clone());
        let region = vec![vec![IndexRange::of(x0, x1), IndexRange::of(y0, y1)]];
        let inspector =
            SimpleRegionInspector::new(region, 1, |range: &IndexRange<u64>| range.clone());
        let combiner = PlainFilterCombiner::new(IndexRange::of(0u64, 1));
        let mut builder =
            BacktrackingQueryBuilder::new(inspector, combiner, max_ranges, always_remove_vacuum);
        let mut visitor = QueryRangeVisitor::new(spec, &mut builder);
        curve.accept(&mut visitor);
        let query = builder.get();
        prop_assert!(query.len() <= max_ranges, "bound exceeded: {}", query.len());
        for pair in query.filtered_index_ranges().windows(2) {
            prop_assert!(
                pair[0].index_range().end() <= pair[1].index_range().start(),
                "ranges overlap or regress"
            );
        }
        // The exact inspector never flags over-selectivity on its own; with
        // the plain combiner the whole plan stays unflagged.
        prop_assert!(!query.is_potential_over_selectivity());
    }
}
