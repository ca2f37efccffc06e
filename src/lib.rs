//! Terralod - adaptive quadtree terrain with continuous level of detail

pub mod core;
pub mod math;
pub mod terrain;
