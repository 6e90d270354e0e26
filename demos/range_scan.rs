//! Plan a bounded set of key scans for a box query over Hilbert-ordered keys.
use chilbert::prelude::*;

fn main() {
    // A 16x16 space: (x, y) points keyed by their 8-bit compact index.
    let spec = MultiDimensionalSpec::new(vec![4, 4]);
    let mut curve = CompactHilbertCurve::new(spec.clone());

    // Some stored points and their big-endian keys.
    let stored = [(2u64, 3u64), (3, 3), (9, 9), (2, 12), (3, 13)];
    let mut index = BitVector::with_size(spec.sum_bits_per_dimension());
    for (x, y) in stored {
        let point = vec![BitVector::from_value(x, 4), BitVector::from_value(y, 4)];
        curve.index(&point, 0, &mut index);
        println!("point ({x:2},{y:2}) -> key {:02x?}", index.to_big_endian_byte_array());
    }

    // Query the box x in [0, 4), y in [0, 4) with at most two scans.
    let region = vec![vec![IndexRange::of(0u64, 4), IndexRange::of(0u64, 4)]];
    let inspector = SimpleRegionInspector::new(region, 1, |range: &IndexRange<u64>| range.clone());
    let combiner = PlainFilterCombiner::new(IndexRange::of(0u64, 1));
    let mut builder = BacktrackingQueryBuilder::new(inspector, combiner, 2, true);
    let mut visitor = QueryRangeVisitor::new(spec, &mut builder);
    curve.accept(&mut visitor);

    let query = builder.get();
    println!("scans: {}", query.len());
    for range in query.filtered_index_ranges() {
        println!(
            "  scan [{}, {}) over-selective: {}",
            range.index_range().start(),
            range.index_range().end(),
            range.is_potential_over_selectivity()
        );
    }

    // The whole box is one contiguous stretch at the start of the curve.
    assert_eq!(query.len(), 1, "Expected a single scan");
    let only = &query.filtered_index_ranges()[0];
    assert_eq!(*only.index_range().start(), 0);
    assert_eq!(*only.index_range().end(), 16);
}
