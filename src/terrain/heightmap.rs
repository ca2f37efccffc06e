//! Height-map deltas and static seeding.

use super::corner::CornerContext;
use super::layout::Quadrant;
use super::tree::QuadTree;
use crate::core::{Error, Result};

/// Rectangular grid of height deltas placed in world space.
///
/// Grid cell `(i, j)` sits at world `(x_origin + (i << scale), z_origin + (j << scale))`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMapInfo {
    pub x_origin: i32,
    pub z_origin: i32,
    pub x_size: usize,
    pub z_size: usize,
    /// Stride between rows of `data`; at least `x_size`.
    pub row_width: usize,
    /// Log2 of the world distance between samples.
    pub scale: u32,
    pub data: Vec<f32>,
}

impl HeightMapInfo {
    /// Tightly packed grid, `data.len() == x_size * z_size`.
    pub fn new(
        x_origin: i32,
        z_origin: i32,
        x_size: usize,
        z_size: usize,
        scale: u32,
        data: Vec<f32>,
    ) -> Result<Self> {
        Self::with_row_width(x_origin, z_origin, x_size, z_size, x_size, scale, data)
    }

    /// Grid whose rows are `row_width` samples apart.
    pub fn with_row_width(
        x_origin: i32,
        z_origin: i32,
        x_size: usize,
        z_size: usize,
        row_width: usize,
        scale: u32,
        data: Vec<f32>,
    ) -> Result<Self> {
        if scale > 30 {
            return Err(Error::HeightMap(format!("scale {} too large", scale)));
        }
        if row_width < x_size {
            return Err(Error::HeightMap(format!(
                "row width {} smaller than x size {}",
                row_width, x_size
            )));
        }
        let needed = if z_size == 0 { 0 } else { row_width * (z_size - 1) + x_size };
        if data.len() < needed {
            return Err(Error::HeightMap(format!(
                "{} samples given, {}x{} grid with row width {} needs {}",
                data.len(), x_size, z_size, row_width, needed
            )));
        }
        if data.iter().any(|d| !d.is_finite()) {
            return Err(Error::HeightMap("samples must be finite".into()));
        }
        Ok(Self { x_origin, z_origin, x_size, z_size, row_width, scale, data })
    }

    /// Bilinear sample at integer world `(x, z)`. Zero outside the grid,
    /// including its last row and column.
    pub fn sample(&self, x: i32, z: i32) -> f32 {
        let dx = x as i64 - self.x_origin as i64;
        let dz = z as i64 - self.z_origin as i64;
        let ix = dx >> self.scale;
        let iz = dz >> self.scale;
        if ix < 0 || iz < 0 || ix + 1 >= self.x_size as i64 || iz + 1 >= self.z_size as i64 {
            return 0.0;
        }
        let (ix, iz) = (ix as usize, iz as usize);

        let mask = (1i64 << self.scale) - 1;
        let fx = (dx & mask) as f32 / (mask + 1) as f32;
        let fz = (dz & mask) as f32 / (mask + 1) as f32;

        let at = |i: usize, j: usize| self.data[i + j * self.row_width];
        let s00 = at(ix, iz);
        let s01 = at(ix + 1, iz);
        let s10 = at(ix, iz + 1);
        let s11 = at(ix + 1, iz + 1);

        (s00 * (1.0 - fx) + s01 * fx) * (1.0 - fz) + (s10 * (1.0 - fx) + s11 * fx) * fz
    }

    /// Whether a square block at `(x, z)` of edge `size` could touch the grid.
    /// The grid is padded by one sample before and two after.
    fn overlaps_block(&self, x: i32, z: i32, size: i32) -> bool {
        let (x, z, size) = (x as i64, z as i64, size as i64);
        let step = 1i64 << self.scale;
        let x_end = self.x_origin as i64 + ((self.x_size as i64 + 2) << self.scale);
        let z_end = self.z_origin as i64 + ((self.z_size as i64 + 2) << self.scale);
        !(x > x_end
            || x + size < self.x_origin as i64 - step
            || z > z_end
            || z + size < self.z_origin as i64 - step)
    }
}

impl QuadTree {
    /// Add the grid's deltas to every vertex it covers.
    ///
    /// Nodes are created down to the grid's resolution where it overlaps the
    /// tree. Modified nodes and their ancestors become static and dirty.
    pub fn add_height_map(&mut self, hm: &HeightMapInfo) {
        let before = self.node_count();
        let root = self.root_context();
        self.add_height_map_aux(&root, hm);
        log::info!(
            "Seeded {}x{} height map (scale {}) at ({}, {}): {} -> {} nodes",
            hm.x_size, hm.z_size, hm.scale, hm.x_origin, hm.z_origin,
            before, self.node_count()
        );
    }

    fn add_height_map_aux(&mut self, cd: &CornerContext<'_>, hm: &HeightMapInfo) {
        if !hm.overlaps_block(cd.x_origin, cd.z_origin, cd.whole()) {
            return;
        }

        if let Some(parent) = cd.parent {
            self.enable_child(cd.quadrant, parent);
        }

        let id = cd.node;
        for quadrant in Quadrant::ALL {
            // Children see this node's heights from before the deltas below.
            let vertices = self.nodes[id].vertices;
            let child = match self.nodes[id].child(quadrant) {
                Some(child) => child,
                None if cd.level > hm.scale => self.create_child(quadrant, cd),
                None => continue,
            };
            let q = cd.child(&vertices, quadrant, child);
            self.add_height_map_aux(&q, hm);
        }

        let half = cd.half();
        let (x, z) = (cd.x_origin, cd.z_origin);
        let deltas = [
            hm.sample(x + half, z + half),
            hm.sample(x + 2 * half, z + half),
            hm.sample(x + half, z),
            hm.sample(x, z + half),
            hm.sample(x + half, z + 2 * half),
        ];

        let node = &mut self.nodes[id];
        for (vertex, delta) in node.vertices.iter_mut().zip(deltas) {
            if delta != 0.0 {
                vertex.y += delta;
                node.dirty = true;
            }
        }

        if !self.nodes[id].dirty {
            let children = self.nodes[id].children;
            if children.iter().flatten().any(|&c| self.nodes[c].dirty) {
                self.nodes[id].dirty = true;
            }
        }

        if self.nodes[id].dirty {
            self.set_static(cd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_spike(value: f32) -> HeightMapInfo {
        let mut data = vec![0.0; 17 * 17];
        data[5 + 6 * 17] = value;
        HeightMapInfo::new(0, 0, 17, 17, 0, data).unwrap()
    }

    #[test]
    fn test_rejects_short_data() {
        let result = HeightMapInfo::new(0, 0, 4, 4, 0, vec![0.0; 15]);
        assert!(matches!(result, Err(Error::HeightMap(_))));
        assert!(HeightMapInfo::with_row_width(0, 0, 4, 4, 3, 0, vec![0.0; 16]).is_err());
        assert!(HeightMapInfo::new(0, 0, 2, 1, 0, vec![f32::NAN, 0.0]).is_err());
    }

    #[test]
    fn test_sample_interpolates_within_cell() {
        // 3x3 at scale 1: samples every 2 units
        let data = vec![
            0.0, 4.0, 0.0,
            8.0, 12.0, 0.0,
            0.0, 0.0, 0.0,
        ];
        let hm = HeightMapInfo::new(10, 20, 3, 3, 1, data).unwrap();
        assert_eq!(hm.sample(10, 20), 0.0);
        assert_eq!(hm.sample(11, 20), 2.0);
        assert_eq!(hm.sample(10, 21), 4.0);
        assert_eq!(hm.sample(11, 21), 6.0);
        assert_eq!(hm.sample(12, 22), 12.0);
    }

    #[test]
    fn test_sample_outside_grid_is_zero() {
        let hm = HeightMapInfo::new(0, 0, 3, 3, 0, vec![1.0; 9]).unwrap();
        assert_eq!(hm.sample(-1, 0), 0.0);
        assert_eq!(hm.sample(0, -1), 0.0);
        // Last row and column are never sampled directly.
        assert_eq!(hm.sample(2, 0), 0.0);
        assert_eq!(hm.sample(0, 2), 0.0);
        assert_eq!(hm.sample(1, 1), 1.0);
        assert_eq!(hm.sample(i32::MIN, i32::MAX), 0.0);
    }

    #[test]
    fn test_row_width_stride() {
        let data = vec![1.0, 2.0, 99.0, 3.0, 4.0, 99.0];
        let hm = HeightMapInfo::with_row_width(0, 0, 2, 2, 3, 1, data).unwrap();
        assert_eq!(hm.sample(0, 0), 1.0);
        assert_eq!(hm.sample(1, 1), 2.5);
    }

    #[test]
    fn test_single_delta_marks_only_covering_nodes() {
        let mut tree = QuadTree::flat(3, 0.0).unwrap();
        tree.add_height_map(&single_spike(4.0));

        let mut leaves = 0;
        tree.for_each_node(|cd, node| {
            if node.is_static() {
                let w = cd.whole();
                assert!(
                    (cd.x_origin..=cd.x_origin + w).contains(&5)
                        && (cd.z_origin..=cd.z_origin + w).contains(&6),
                    "static node at ({}, {}) level {} misses the delta",
                    cd.x_origin, cd.z_origin, cd.level
                );
                assert!(node.is_dirty());
                if cd.level == 0 {
                    leaves += 1;
                }
            }
        });
        // (5, 6) is the north vertex of one leaf and the south vertex of another.
        assert_eq!(leaves, 2);
        assert!(tree.node(tree.root()).is_static());
        assert_eq!(tree.height_at(5.0, 6.0), 4.0);
        assert_eq!(tree.height_at(12.0, 12.0), 0.0);
    }

    #[test]
    fn test_disjoint_map_changes_nothing() {
        let mut tree = QuadTree::flat(3, 0.0).unwrap();
        let hm = HeightMapInfo::new(100, 100, 4, 4, 0, vec![1.0; 16]).unwrap();
        tree.add_height_map(&hm);
        assert_eq!(tree.node_count(), 1);
        assert!(!tree.node(tree.root()).is_static());
    }

    #[test]
    fn test_seeded_bounds_are_monotonic() {
        let data: Vec<f32> = (0..17 * 17).map(|i| ((i * 37) % 23) as f32 - 11.0).collect();
        let hm = HeightMapInfo::new(0, 0, 17, 17, 0, data).unwrap();
        let mut tree = QuadTree::flat(3, 0.0).unwrap();
        tree.add_height_map(&hm);
        let root = tree.root_context();
        tree.recompute_error_and_lighting(&root);

        tree.for_each_node(|cd, node| {
            assert!(!node.is_dirty());
            let (min_y, max_y) = node.height_range();
            for v in node.vertices().iter().chain(cd.corners.iter()) {
                assert!(min_y <= v.y && v.y <= max_y);
            }
            for child in node.children().iter().flatten() {
                let (child_min, child_max) = tree.node(*child).height_range();
                assert!(min_y <= child_min && child_max <= max_y);
            }
        });
    }

    #[test]
    fn test_seeding_twice_accumulates() {
        let mut tree = QuadTree::flat(3, 0.0).unwrap();
        tree.add_height_map(&single_spike(1.5));
        tree.add_height_map(&single_spike(1.5));
        assert_eq!(tree.height_at(5.0, 6.0), 3.0);
    }
}
