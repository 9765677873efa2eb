//! Route Lookup Performance Benchmark
//!
//! Measures the distance → frame mapping done on every display tick.
//!
//! **Goal:** A lookup must be negligible next to a 33ms tick
//! **Target:** <1µs per lookup on a route with thousands of breakpoints

use bigring_common::{Course, DistanceMappingEntry, ProfileEntry, Route, VideoInformation};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Route with a speed change every 25 frames
fn long_route(breakpoints: u32) -> Route {
    let mappings = (0..breakpoints)
        .map(|i| DistanceMappingEntry::new(i * 25, 0.2 + f64::from(i % 7) * 0.05))
        .collect();
    let profile = (0..breakpoints / 4)
        .map(|i| ProfileEntry::new(f64::from(i) * 20.0, f64::from(i % 11) - 5.0))
        .collect();
    Route::new(
        "Bench",
        VideoInformation::new("bench.avi", 30.0),
        vec![Course::new("All", 0.0, 1_000_000.0)],
        mappings,
        profile,
    )
}

fn bench_frame_for_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_lookup");

    for breakpoints in [10u32, 1_000, 10_000] {
        let route = long_route(breakpoints);
        let total = route.total_distance();

        group.bench_with_input(
            BenchmarkId::new("frame_for_distance", breakpoints),
            &route,
            |b, route| {
                let mut distance = 0.0;
                b.iter(|| {
                    distance = (distance + 0.37) % total;
                    black_box(route.frame_for_distance(black_box(distance)))
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("altitude_for_distance", breakpoints),
            &route,
            |b, route| {
                let mut distance = 0.0;
                b.iter(|| {
                    distance = (distance + 0.37) % total;
                    black_box(route.altitude_for_distance(black_box(distance)))
                });
            },
        );
    }

    group.finish();
}

fn bench_route_construction(c: &mut Criterion) {
    c.bench_function("route_new_10k_breakpoints", |b| {
        b.iter(|| black_box(long_route(black_box(10_000))));
    });
}

criterion_group!(benches, bench_frame_for_distance, bench_route_construction);
criterion_main!(benches);
