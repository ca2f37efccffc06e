//! Terrain configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::tree::MAX_ROOT_LEVEL;
use crate::core::{Error, Result};

/// Settings for building and refining a [`QuadTree`](super::QuadTree).
///
/// Missing fields in a JSON file fall back to [`Default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Root level; the terrain is `2 << root_level` units on a side.
    pub root_level: u32,
    /// World-space (x, z) of the root's north-west corner.
    pub origin: [i32; 2],
    /// Detail factor for the update pass. Higher keeps more triangles.
    pub detail: f32,
    /// Multiplier applied to heights when rendering and culling.
    pub vertical_scale: f32,
    /// Threshold used by the static cull after seeding.
    pub static_cull_threshold: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            root_level: 15,
            origin: [0, 0],
            detail: 100.0,
            vertical_scale: 1.0,
            static_cull_threshold: 100.0,
        }
    }
}

impl TerrainConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded terrain config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Write this config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check ranges the tree relies on.
    pub fn validate(&self) -> Result<()> {
        if self.root_level > MAX_ROOT_LEVEL {
            return Err(Error::Terrain(format!(
                "root_level {} exceeds maximum {}",
                self.root_level, MAX_ROOT_LEVEL
            )));
        }
        if !self.detail.is_finite() || self.detail < 0.0 {
            return Err(Error::Terrain(format!("invalid detail {}", self.detail)));
        }
        if !self.vertical_scale.is_finite() || self.vertical_scale <= 0.0 {
            return Err(Error::Terrain(format!(
                "invalid vertical_scale {}",
                self.vertical_scale
            )));
        }
        if !self.static_cull_threshold.is_finite() || self.static_cull_threshold < 0.0 {
            return Err(Error::Terrain(format!(
                "invalid static_cull_threshold {}",
                self.static_cull_threshold
            )));
        }
        Ok(())
    }
}
