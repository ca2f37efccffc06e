//! Triangle emission for the current enabled state.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use super::corner::{CornerContext, VertInfo};
use super::layout::{Direction, Quadrant};
use super::tree::QuadTree;
use crate::math::{Aabb, Frustum, Visibility};

/// Output vertex - 24 bytes, ready for a vertex buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl TerrainVertex {
    fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }
}

/// Indexed triangle list produced by [`QuadTree::render`].
#[derive(Clone, Debug, Default)]
pub struct TerrainMesh {
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<u32>,
}

impl TerrainMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all geometry, keeping allocations for the next frame.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Visibility test for node bounds during rendering.
pub trait BoxClassifier {
    fn classify_box(&self, min: Vec3, max: Vec3) -> Visibility;
}

impl BoxClassifier for Frustum {
    fn classify_box(&self, min: Vec3, max: Vec3) -> Visibility {
        self.classify_aabb(&Aabb::new(min, max))
    }
}

/// Treats everything as fully visible.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCulling;

impl BoxClassifier for NoCulling {
    fn classify_box(&self, _min: Vec3, _max: Vec3) -> Visibility {
        Visibility::Full
    }
}

// Local vertex indices: 0 center, then E, NE, N, NW, W, SW, S, SE
// counter-clockwise from east.

/// Fan triangle across a whole edge when its midpoint is disabled.
const EDGE_TRIANGLE: [[u32; 3]; 4] = [[0, 8, 2], [0, 2, 4], [0, 4, 6], [0, 6, 8]];

/// Half-edge triangles when the midpoint is enabled, each owned by the
/// quadrant it covers.
const HALF_EDGE_TRIANGLES: [[(Quadrant, [u32; 3]); 2]; 4] = [
    [(Quadrant::SouthEast, [0, 8, 1]), (Quadrant::NorthEast, [0, 1, 2])],
    [(Quadrant::NorthEast, [0, 2, 3]), (Quadrant::NorthWest, [0, 3, 4])],
    [(Quadrant::NorthWest, [0, 4, 5]), (Quadrant::SouthWest, [0, 5, 6])],
    [(Quadrant::SouthWest, [0, 6, 7]), (Quadrant::SouthEast, [0, 7, 8])],
];

impl QuadTree {
    /// Append the visible triangles to `mesh`. Returns how many were added.
    pub fn render(&self, classifier: &impl BoxClassifier, mesh: &mut TerrainMesh) -> usize {
        let before = mesh.triangle_count();
        let root = self.root_context();
        self.render_aux(&root, classifier, Visibility::Partial, mesh);
        let added = mesh.triangle_count() - before;
        log::debug!("Rendered {} terrain triangles", added);
        added
    }

    fn render_aux(
        &self,
        cd: &CornerContext<'_>,
        classifier: &impl BoxClassifier,
        mut visibility: Visibility,
        mesh: &mut TerrainMesh,
    ) {
        let node = &self.nodes[cd.node];
        let half = cd.half();
        let whole = cd.whole();
        let scale = self.vertical_scale;

        if visibility != Visibility::Full {
            let min = cd.point(0, 0, node.min_y * scale);
            let max = cd.point(whole, whole, node.max_y * scale);
            visibility = classifier.classify_box(min, max);
            if visibility == Visibility::Outside {
                return;
            }
        }

        // Quadrants not covered by an active child are drawn here.
        let mut local = [false; 4];
        for quadrant in Quadrant::ALL {
            if node.enabled.child(quadrant) {
                if let Some(child) = node.child(quadrant) {
                    let q = cd.child(&node.vertices, quadrant, child);
                    self.render_aux(&q, classifier, visibility, mesh);
                    continue;
                }
                debug_assert!(false, "active quadrant {:?} has no node", quadrant);
            }
            local[quadrant.index()] = true;
        }
        if !local.contains(&true) {
            return;
        }

        let v = &node.vertices;
        let c = &cd.corners;
        let samples: [(i32, i32, &VertInfo); 9] = [
            (half, half, &v[0]),
            (whole, half, &v[1]),
            (whole, 0, &c[0]),
            (half, 0, &v[2]),
            (0, 0, &c[1]),
            (0, half, &v[3]),
            (0, whole, &c[2]),
            (half, whole, &v[4]),
            (whole, whole, &c[3]),
        ];
        let base = mesh.vertices.len() as u32;
        mesh.vertices.extend(
            samples
                .iter()
                .map(|&(dx, dz, s)| TerrainVertex::new(cd.point(dx, dz, s.y * scale), s.normal)),
        );

        for dir in Direction::ALL {
            let i = dir.index();
            if !node.enabled.edge(dir) {
                mesh.indices.extend(EDGE_TRIANGLE[i].map(|k| base + k));
                continue;
            }
            for (quadrant, tri) in HALF_EDGE_TRIANGLES[i] {
                if local[quadrant.index()] {
                    mesh.indices.extend(tri.map(|k| base + k));
                }
            }
        }
    }
}
