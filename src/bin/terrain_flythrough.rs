//! Flythrough demo: builds a noise terrain and flies a camera over it,
//! running the update and render passes every frame.
//!
//! Usage: cargo run --release --bin terrain_flythrough -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>   Terrain config JSON (default: built-in defaults)
//!   --level <N>       Root level, terrain is 2 << N units wide (default: 10)
//!   --seed <SEED>     Noise seed (default: 12345)
//!   --detail <D>      Update detail factor (default: from config)
//!   --frames <N>      Frames to simulate (default: 240)
//!   --height <H>      Terrain height scale (default: 120.0)

use std::time::Instant;

use glam::{Mat4, Vec3};

use terralod::core::Result;
use terralod::math::Frustum;
use terralod::terrain::{QuadTree, TerrainConfig, TerrainGenerator, TerrainMesh, TerrainParams};

/// Height-map samples per side are capped near this.
const MAX_GRID: u32 = 256;

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => TerrainConfig::load(path)?,
        None => TerrainConfig { root_level: 10, ..Default::default() },
    };
    if let Some(level) = parse_u32_arg(&args, "--level") {
        config.root_level = level;
    }
    if let Some(detail) = parse_f32_arg(&args, "--detail") {
        config.detail = detail;
    }
    let seed = parse_u32_arg(&args, "--seed").unwrap_or(12345);
    let frames = parse_usize_arg(&args, "--frames").unwrap_or(240);
    let height_scale = parse_f32_arg(&args, "--height").unwrap_or(120.0);

    let mut tree = QuadTree::from_config(&config, [0.0; 4])?;
    let size = tree.size();
    let (x_origin, z_origin) = tree.origin();

    println!("=== Terralod Flythrough ===");
    println!("Terrain: {}x{} (root level {})", size, size, config.root_level);
    println!("Seed:    {}", seed);
    println!("Detail:  {}", config.detail);
    println!("Frames:  {}", frames);
    println!();

    // Seed the tree from a noise grid, coarse enough to stay small.
    let grid_scale = (config.root_level + 1).saturating_sub(MAX_GRID.ilog2());
    let samples = ((size >> grid_scale) + 1) as usize;
    let generator = TerrainGenerator::new(TerrainParams {
        seed,
        scale: size as f32 / 4.0,
        height_scale,
        octaves: 6,
        ..Default::default()
    });

    let start = Instant::now();
    let hm = generator.height_map(x_origin, z_origin, samples, samples, grid_scale)?;
    tree.add_height_map(&hm);
    tree.static_cull(config.static_cull_threshold);
    println!(
        "Seeded {} samples in {:.1}ms, {} nodes after static cull",
        samples * samples,
        start.elapsed().as_secs_f64() * 1000.0,
        tree.node_count()
    );

    let center = Vec3::new(
        x_origin as f32 + size as f32 * 0.5,
        0.0,
        z_origin as f32 + size as f32 * 0.5,
    );
    let radius = size as f32 * 0.35;
    let aspect = 16.0 / 9.0;
    let proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.5, size as f32 * 2.0);

    let mut mesh = TerrainMesh::new();
    let mut total_triangles = 0usize;
    let mut peak_nodes = 0usize;
    let start = Instant::now();

    for frame in 0..frames {
        let angle = frame as f32 / frames.max(1) as f32 * std::f32::consts::TAU;
        let ground = tree.height_at(
            center.x + angle.cos() * radius,
            center.z + angle.sin() * radius,
        );
        let eye = Vec3::new(
            center.x + angle.cos() * radius,
            ground + height_scale * 0.25 + 2.0,
            center.z + angle.sin() * radius,
        );
        let forward = Vec3::new(-angle.sin(), -0.2, angle.cos());
        let view = Mat4::look_at_rh(eye, eye + forward, Vec3::Y);
        let frustum = Frustum::from_view_projection(&(proj * view));

        tree.update(eye, config.detail);
        mesh.clear();
        let triangles = tree.render(&frustum, &mut mesh);

        total_triangles += triangles;
        peak_nodes = peak_nodes.max(tree.node_count());
        if frame % 30 == 0 {
            log::info!(
                "Frame {:4}: eye ({:.0}, {:.0}, {:.0}), {} nodes, {} triangles",
                frame, eye.x, eye.y, eye.z, tree.node_count(), triangles
            );
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!();
    println!("=== Summary ===");
    println!("Frames:          {}", frames);
    println!("Avg triangles:   {}", total_triangles / frames.max(1));
    println!("Peak nodes:      {}", peak_nodes);
    println!(
        "Avg frame time:  {:.3}ms",
        elapsed * 1000.0 / frames.max(1) as f64
    );

    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
