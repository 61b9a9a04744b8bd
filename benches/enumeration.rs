use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use stereomol::*;
use shapes::{Catalog, Name, Vertex};
use stereo::{enumerate, EnumerationOptions, Link, Occupation, Rank};
use strong::surjection::Surjection;

use itertools::Itertools;
use std::convert::TryFrom;

fn occupation(ranks: &[usize]) -> Occupation {
    let sigma: Vec<Rank> = ranks.iter().copied().map_into().collect();
    Surjection::try_from(sigma).expect("Valid occupation")
}

fn enumeration(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("enumeration");
    let catalog = Catalog::shared();
    let options = EnumerationOptions::default();

    let cases: [(Name, &[usize]); 5] = [
        (Name::Tetrahedron, &[0, 1, 2, 3]),
        (Name::TrigonalBipyramid, &[0, 0, 1, 1, 2]),
        (Name::Octahedron, &[0, 0, 1, 1, 2, 2]),
        (Name::Octahedron, &[0, 1, 2, 3, 4, 5]),
        (Name::PentagonalBipyramid, &[0, 0, 0, 1, 1, 2, 2]),
    ];

    for (name, ranks) in cases {
        let entry = catalog.entry(name);
        let occupation = occupation(ranks);
        let label = format!("{} {:?}", name, ranks);
        bench_group.bench_with_input(
            BenchmarkId::new("unlinked", label),
            &occupation,
            |b, o| b.iter(|| enumerate(black_box(entry), black_box(o), &[], &options))
        );
    }

    // Three bidentate ligands
    let octahedron = catalog.entry(Name::Octahedron);
    let chelates = occupation(&[0, 0, 0, 0, 0, 0]);
    let links: Vec<Link> = [(0u8, 1u8), (2, 3), (4, 5)].iter()
        .map(|&(a, b)| Link::new(Vertex::from(a), Vertex::from(b)))
        .collect();
    bench_group.bench_function(
        "linked octahedron",
        |b| b.iter(|| enumerate(black_box(octahedron), black_box(&chelates), black_box(&links), &options))
    );

    bench_group.finish();
}

criterion_group!(benches, enumeration);
criterion_main!(benches);
