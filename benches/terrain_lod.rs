use criterion::{criterion_group, criterion_main, Criterion, black_box};

use terralod::terrain::{NoCulling, QuadTree, TerrainGenerator, TerrainMesh, TerrainParams};

use glam::Vec3;

fn seeded_tree(level: u32) -> QuadTree {
    let mut tree = QuadTree::flat(level, 0.0).expect("valid root level");
    let generator = TerrainGenerator::new(TerrainParams {
        scale: (2 << level) as f32 / 4.0,
        ..Default::default()
    });
    let samples = ((2 << level) + 1) as usize;
    let hm = generator
        .height_map(0, 0, samples, samples, 0)
        .expect("valid grid");
    tree.add_height_map(&hm);
    tree.static_cull(50.0);
    tree
}

fn bench_add_height_map(c: &mut Criterion) {
    let generator = TerrainGenerator::new(TerrainParams::default());
    let hm = generator.height_map(0, 0, 129, 129, 0).expect("valid grid");

    c.bench_function("add_height_map_128", |b| {
        b.iter(|| {
            let mut tree = QuadTree::flat(6, 0.0).expect("valid root level");
            tree.add_height_map(black_box(&hm));
            tree
        });
    });
}

fn bench_update_static_viewer(c: &mut Criterion) {
    let mut tree = seeded_tree(7);
    let viewer = Vec3::new(64.0, 40.0, 64.0);
    tree.update(viewer, 50.0);

    c.bench_function("update_static_viewer", |b| {
        b.iter(|| tree.update(black_box(viewer), 50.0));
    });
}

fn bench_update_moving_viewer(c: &mut Criterion) {
    let mut tree = seeded_tree(7);

    c.bench_function("update_moving_viewer", |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            let t = frame as f32 * 0.05;
            let viewer = Vec3::new(128.0 + t.cos() * 80.0, 30.0, 128.0 + t.sin() * 80.0);
            tree.update(black_box(viewer), 50.0);
        });
    });
}

fn bench_render(c: &mut Criterion) {
    let mut tree = seeded_tree(7);
    tree.update(Vec3::new(64.0, 40.0, 64.0), 50.0);
    let mut mesh = TerrainMesh::new();

    c.bench_function("render_no_culling", |b| {
        b.iter(|| {
            mesh.clear();
            tree.render(black_box(&NoCulling), &mut mesh)
        });
    });
}

fn bench_static_cull(c: &mut Criterion) {
    c.bench_function("static_cull_level_6", |b| {
        b.iter_batched(
            || seeded_tree(6),
            |mut tree| tree.static_cull(black_box(10.0)),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_add_height_map,
    bench_update_static_viewer,
    bench_update_moving_viewer,
    bench_render,
    bench_static_cull,
);
criterion_main!(benches);
