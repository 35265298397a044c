use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geocell::prelude::*;
use geocell::{adjacent, compute};
use uuid::Uuid;

fn populated_index(count: usize) -> MemoryGeoIndex {
    let writer =
        GeoIndexWriter::new(SimpleBucketLocator::default(), Uuid::nil(), SearchConfig::default()).unwrap();
    let scope = IndexScope::new(Uuid::nil(), "bench");
    let mut index = MemoryGeoIndex::new();

    for i in 0..count {
        let lat = 40.7128 + ((i % 100) as f64 * 0.001);
        let lon = -74.0060 + ((i / 100) as f64 * 0.001);
        let location = EntityLocationRef::new(
            Uuid::from_u128(i as u128 + 1),
            "bench",
            Uuid::from_u128(i as u128 + 1),
            lat,
            lon,
        );
        writer.store_location(&mut index, &scope, "location", &location).unwrap();
    }
    index
}

fn benchmark_cell_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("cell_operations");
    let point = Point::new(-74.0060, 40.7128);

    for resolution in [5, 9, 13] {
        group.bench_with_input(BenchmarkId::new("compute", resolution), &resolution, |b, &res| {
            b.iter(|| compute(black_box(&point), res).unwrap())
        });
    }

    let cell = compute(&point, 9).unwrap();
    group.bench_function("adjacent_all_directions", |b| {
        b.iter(|| {
            for direction in Direction::ALL {
                black_box(adjacent(black_box(&cell), direction).unwrap());
            }
        })
    });

    group.bench_function("generate_geo_cells", |b| {
        b.iter(|| generate_geo_cells(black_box(&point)).unwrap())
    });

    group.finish();
}

fn benchmark_bbox_cells(c: &mut Criterion) {
    let mut group = c.benchmark_group("bbox_cells");

    for span in [0.01, 0.1, 1.0] {
        let bbox = BoundingBox::new(40.7 + span, -74.0 + span, 40.7, -74.0);
        group.bench_with_input(BenchmarkId::new("best_bbox_search_cells", span), &bbox, |b, bbox| {
            b.iter(|| best_bbox_search_cells(black_box(bbox), &DefaultCostFunction).unwrap())
        });
    }

    group.finish();
}

fn benchmark_proximity_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("proximity_search");
    let center = Point::new(-73.9560, 40.7628);

    for size in [1_000, 10_000] {
        let index = populated_index(size);
        let searcher = GeoIndexSearcher::new(
            &index,
            SimpleBucketLocator::default(),
            Uuid::nil(),
            IndexScope::new(Uuid::nil(), "bench"),
            SearchConfig::default(),
        )
        .unwrap();

        for max_results in [10, 100] {
            group.bench_with_input(
                BenchmarkId::new(format!("nearest_{}", max_results), size),
                &max_results,
                |b, &max_results| {
                    b.iter(|| {
                        searcher
                            .proximity_search(
                                None,
                                &[],
                                black_box(&center),
                                "location",
                                0.0,
                                5_000.0,
                                max_results,
                            )
                            .unwrap()
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_cell_operations,
    benchmark_bbox_cells,
    benchmark_proximity_search
);
criterion_main!(benches);
