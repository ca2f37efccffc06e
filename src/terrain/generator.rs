//! Noise-based procedural height source

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use super::heightmap::HeightMapInfo;
use crate::core::{Error, Result};

/// Parameters controlling terrain generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub seed: u32,
    pub scale: f32,        // Horizontal scale (larger = smoother)
    pub height_scale: f32, // Vertical scale (max height)
    pub octaves: u32,      // FBM octaves (detail levels)
    pub persistence: f32,  // FBM persistence (0.5 typical)
    pub lacunarity: f32,   // FBM lacunarity (2.0 typical)
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 100.0,
            height_scale: 64.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Procedural terrain generator using fractal Brownian motion (FBM)
pub struct TerrainGenerator {
    params: TerrainParams,
    noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given parameters
    pub fn new(params: TerrainParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    /// Get terrain parameters
    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Get terrain height at world position (x, z)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let nx = (x / self.params.scale) as f64;
        let nz = (z / self.params.scale) as f64;

        // Noise is in [-1, 1]; map to [0, height_scale]
        let noise_value = self.noise.get([nx, nz]);
        let normalized = ((noise_value + 1.0) / 2.0).clamp(0.0, 1.0);
        (normalized * self.params.height_scale as f64) as f32
    }

    /// Sample a `x_size` by `z_size` grid, `1 << scale` units apart, starting
    /// at world `(x_origin, z_origin)`.
    pub fn height_map(
        &self,
        x_origin: i32,
        z_origin: i32,
        x_size: usize,
        z_size: usize,
        scale: u32,
    ) -> Result<HeightMapInfo> {
        if x_size < 2 || z_size < 2 {
            return Err(Error::HeightMap(format!(
                "height map needs at least 2x2 samples, got {}x{}",
                x_size, z_size
            )));
        }
        let step = 1i64 << scale.min(30);
        let mut data = Vec::with_capacity(x_size * z_size);
        for j in 0..z_size {
            let z = z_origin as i64 + j as i64 * step;
            for i in 0..x_size {
                let x = x_origin as i64 + i as i64 * step;
                data.push(self.height_at(x as f32, z as f32));
            }
        }
        log::debug!(
            "Generated {}x{} height map at ({}, {}), seed {}",
            x_size, z_size, x_origin, z_origin, self.params.seed
        );
        HeightMapInfo::new(x_origin, z_origin, x_size, z_size, scale, data)
    }
}
