//! Benchmark for point/index mapping throughput.
//!
//! Measures `index` and `index_inverse` over 1M random points for a few
//! representative space shapes, printing wall-clock timings.

use std::time::Instant;

use chilbert::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

const POINTS: usize = 1_000_000;

fn bench_spec(label: &str, depths: Vec<usize>) {
    let spec = MultiDimensionalSpec::new(depths.clone());
    let mut curve = CompactHilbertCurve::new(spec.clone());
    let mut rng = StdRng::seed_from_u64(42);

    // Pre-generate coordinates so the timed loops only map.
    let coords: Vec<Vec<u64>> = (0..POINTS)
        .map(|_| {
            depths
                .iter()
                .map(|bits| {
                    let mask = if *bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
                    rng.random::<u64>() & mask
                })
                .collect()
        })
        .collect();

    let mut point: Vec<BitVector> =
        depths.iter().map(|bits| BitVector::with_size(*bits)).collect();
    let mut index = BitVector::with_size(spec.sum_bits_per_dimension());

    let start = Instant::now();
    let mut checksum = 0u64;
    for c in &coords {
        for (p, v) in point.iter_mut().zip(c) {
            p.copy_from_u64(*v);
        }
        curve.index(&point, 0, &mut index);
        checksum ^= index.to_u64();
    }
    let forward = start.elapsed();

    let start = Instant::now();
    for c in &coords {
        for (p, v) in point.iter_mut().zip(c) {
            p.copy_from_u64(*v);
        }
        curve.index(&point, 0, &mut index);
        curve.index_inverse(&index, &mut point);
        checksum ^= point[0].to_u64();
    }
    let round_trip = start.elapsed();

    println!(
        "{label}: {POINTS} index {}ms, index+inverse {}ms (checksum {checksum:x})",
        forward.as_millis(),
        round_trip.as_millis()
    );
}

fn main() {
    bench_spec("2d x 16 bits", vec![16, 16]);
    bench_spec("3d x 10 bits", vec![10, 10, 10]);
    bench_spec("uneven 20/4/12", vec![20, 4, 12]);
    bench_spec("wide 40/40/20", vec![40, 40, 20]);
}
