//! Benchmarks for atlas generation.

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Point3;
use uvatlas::prelude::*;

fn grid_input(n: usize) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    // A gently curved height field, so segmentation and the conformal
    // solver both do real work.
    for j in 0..=n {
        for i in 0..=n {
            let z = 0.4 * ((i as f64) * 0.6).sin() * ((j as f64) * 0.5).cos();
            vertices.push(Point3::new(i as f64, j as f64, z));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;
            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    (vertices, faces)
}

fn bench_mesh_construction(c: &mut Criterion) {
    let (vertices, faces) = grid_input(20);
    c.bench_function("build_grid_20x20", |b| {
        b.iter(|| build_from_triangles::<u32>(&vertices, &faces).unwrap())
    });
}

fn bench_segmentation(c: &mut Criterion) {
    let (vertices, faces) = grid_input(20);
    let built = build_from_triangles::<u32>(&vertices, &faces).unwrap();
    c.bench_function("compute_charts_20x20", |b| {
        b.iter(|| {
            let mut atlas = Atlas::new(&built.mesh).unwrap();
            atlas
                .compute_charts(&SegmentationSettings::default())
                .unwrap();
            atlas.chart_count()
        })
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let (vertices, faces) = grid_input(16);
    let input = InputMesh::new(&vertices, &faces);
    c.bench_function("generate_16x16", |b| {
        b.iter(|| generate(&input, &AtlasOptions::default()).unwrap())
    });
}

criterion_group!(
    benches,
    bench_mesh_construction,
    bench_segmentation,
    bench_full_pipeline
);
criterion_main!(benches);
