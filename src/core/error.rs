//! Error types for terralod

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Heightmap error: {0}")]
    HeightMap(String),

    #[error("Terrain error: {0}")]
    Terrain(String),
}
