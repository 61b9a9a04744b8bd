use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use stereomol::*;
use molecule::resolve::{fit_shape, ResolverConfig};
use shapes::Catalog;

extern crate nalgebra as na;

fn resolution(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("resolution");
    let catalog = Catalog::shared();
    let config = ResolverConfig::default().with_ambiguity_tolerance(0.0);

    for size in 4..=8 {
        let Ok(entry) = catalog.default_shape(size) else { continue };
        let rotation = quaternions::random_rotation().to_rotation_matrix();
        let directions: Vec<na::Vector3<f64>> = entry.shape.coordinates.column_iter()
            .map(|c| rotation * c)
            .collect();

        bench_group.bench_with_input(
            BenchmarkId::new("fit_shape", size as u64),
            &directions,
            |b, d| b.iter(|| fit_shape(black_box(d), catalog, &config))
        );
    }

    bench_group.finish();
}

criterion_group!(benches, resolution);
criterion_main!(benches);
