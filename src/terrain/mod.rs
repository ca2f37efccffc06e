//! Adaptive quadtree terrain
//!
//! A [`QuadTree`] covers a square heightfield. Each frame, [`QuadTree::update`]
//! refines the mesh near the viewer and coarsens it elsewhere, then
//! [`QuadTree::render`] emits a crack-free triangle list for the result.
//! Height data is seeded with [`QuadTree::add_height_map`].

pub mod config;
pub mod corner;
pub mod cull;
pub mod generator;
pub mod heightmap;
pub mod layout;
pub mod node;
pub mod render;
pub mod tree;
pub mod update;

pub use config::TerrainConfig;
pub use corner::{reconstruct_parent, CornerContext, ParentLayout, VertInfo};
pub use generator::{TerrainGenerator, TerrainParams};
pub use heightmap::HeightMapInfo;
pub use layout::{Direction, EnabledFlags, Quadrant};
pub use node::QuadNode;
pub use render::{BoxClassifier, NoCulling, TerrainMesh, TerrainVertex};
pub use tree::{NodeId, QuadTree, MAX_ROOT_LEVEL};
pub use update::LodView;
