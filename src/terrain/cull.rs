//! Static cull: prune seeded detail that a viewer could never need.

use super::corner::CornerContext;
use super::layout::{Direction, Quadrant};
use super::node::{EAST_ERROR, SOUTH_ERROR};
use super::tree::QuadTree;

/// Edge deviation below which a vertex is treated as lying on its edge.
const FLAT_EPSILON: f32 = 1e-5;

impl QuadTree {
    /// Flatten and delete detail whose error is small relative to its size.
    ///
    /// Resets the tree first, so every node loses its enabled state. Levels
    /// are processed bottom-up so freshly emptied parents can be pruned in
    /// the same call.
    pub fn static_cull(&mut self, threshold: f32) {
        let before = self.node_count();
        self.reset_tree();

        let root = self.root_context();
        if self.nodes[self.root()].dirty {
            self.recompute_error_and_lighting(&root);
        }

        for level in 0..self.root_level() {
            self.static_cull_aux(&root, threshold, level);
        }

        log::info!(
            "Static cull (threshold {}): {} -> {} nodes",
            threshold, before, self.node_count()
        );
    }

    fn static_cull_aux(&mut self, cd: &CornerContext<'_>, threshold: f32, target_level: u32) {
        let id = cd.node;

        if cd.level > target_level {
            for quadrant in Quadrant::UPDATE_ORDER {
                let node = &self.nodes[id];
                if let Some(child) = node.child(quadrant) {
                    let vertices = node.vertices;
                    let q = cd.child(&vertices, quadrant, child);
                    self.static_cull_aux(&q, threshold, target_level);
                }
            }
            return;
        }

        let size = cd.whole() as f32;
        let c = cd.corners;

        // East vertex, unless a child or the eastern neighbour's children use it.
        let node = &self.nodes[id];
        if node.child(Quadrant::NorthEast).is_none()
            && node.child(Quadrant::SouthEast).is_none()
            && node.error[EAST_ERROR] * threshold < size
        {
            let s = self.neighbor(Direction::East, cd);
            let free = s.is_none_or(|s| {
                let n = &self.nodes[s];
                n.child(Quadrant::NorthWest).is_none() && n.child(Quadrant::SouthWest).is_none()
            });
            if free {
                let y = (c[0].y + c[3].y) * 0.5;
                let node = &mut self.nodes[id];
                node.vertices[Direction::East.vertex_slot()].y = y;
                node.error[EAST_ERROR] = 0.0;
                if let Some(s) = s {
                    self.nodes[s].vertices[Direction::West.vertex_slot()].y = y;
                }
                self.nodes[id].dirty = true;
            }
        }

        // South vertex, likewise against the southern neighbour.
        let node = &self.nodes[id];
        if node.child(Quadrant::SouthWest).is_none()
            && node.child(Quadrant::SouthEast).is_none()
            && node.error[SOUTH_ERROR] * threshold < size
        {
            let s = self.neighbor(Direction::South, cd);
            let free = s.is_none_or(|s| {
                let n = &self.nodes[s];
                n.child(Quadrant::NorthEast).is_none() && n.child(Quadrant::NorthWest).is_none()
            });
            if free {
                let y = (c[2].y + c[3].y) * 0.5;
                let node = &mut self.nodes[id];
                node.vertices[Direction::South.vertex_slot()].y = y;
                node.error[SOUTH_ERROR] = 0.0;
                if let Some(s) = s {
                    self.nodes[s].vertices[Direction::North.vertex_slot()].y = y;
                }
                self.nodes[id].dirty = true;
            }
        }

        let node = &self.nodes[id];
        if node.has_children() {
            if node.children.iter().flatten().any(|&child| self.nodes[child].dirty) {
                self.nodes[id].dirty = true;
            }
            return;
        }

        let Some(parent) = cd.parent else {
            return;
        };

        // A leaf is only a candidate when its edges all lie on straight lines
        // between its corners; any other edge height is authored detail.
        let v = &node.vertices;
        let necessary = (0..4).any(|i| {
            let along = (c[i].y + c[(i + 3) & 3].y) * 0.5;
            (v[i + 1].y - along).abs() > FLAT_EPSILON
        });
        if necessary {
            return;
        }

        let size = size * std::f32::consts::SQRT_2;
        let parent_error = self.nodes[parent.node].error[cd.quadrant.error_slot()];
        if parent_error * threshold < size {
            self.free_subtree(id);
            self.nodes[parent.node].children[cd.quadrant.index()] = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::heightmap::HeightMapInfo;

    fn seeded_tree(data: impl Fn(usize, usize) -> f32) -> QuadTree {
        let grid: Vec<f32> = (0..17 * 17).map(|i| data(i % 17, i / 17)).collect();
        let hm = HeightMapInfo::new(0, 0, 17, 17, 0, grid).unwrap();
        let mut tree = QuadTree::flat(3, 0.0).unwrap();
        tree.add_height_map(&hm);
        tree
    }

    #[test]
    fn test_faint_detail_collapses() {
        // North and west borders stay flat; nothing owns those edge vertices.
        let mut tree = seeded_tree(|x, z| {
            if x == 0 || z == 0 { 0.0 } else { ((x * 7 + z * 3) % 5) as f32 * 0.001 }
        });
        assert!(tree.node_count() > 1);
        tree.static_cull(10.0);
        assert_eq!(tree.count_nodes(), 1);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_rough_detail_survives_high_threshold() {
        let mut tree = seeded_tree(|x, z| ((x * 7 + z * 13) % 5) as f32 * 3.0);
        tree.static_cull(1.0e4);
        assert!(tree.count_nodes() > 1);
        // North vertex of the leaf at (4, 6); its east edge is far off straight.
        assert_eq!(tree.height_at(5.0, 6.0), 9.0);
        tree.for_each_node(|_, node| assert!(node.is_static()));
    }

    #[test]
    fn test_zero_threshold_keeps_border_edge_detail() {
        let mut tree = seeded_tree(|x, z| ((x * 3 + z) % 4) as f32);
        let before = tree.count_nodes();
        tree.static_cull(0.0);
        let after = tree.count_nodes();
        assert!(after > 1 && after < before);
        // North vertex of the leaf at (0, 0) lies on the tree border.
        assert_eq!(tree.height_at(1.0, 0.0), 3.0);
        assert!(tree.node(tree.root()).enabled().is_empty());
    }

    #[test]
    fn test_authored_edge_height_survives() {
        let mut data = vec![0.0; 5 * 5];
        data[1] = 4.0;
        let hm = HeightMapInfo::new(0, 0, 5, 5, 0, data).unwrap();
        let mut tree = QuadTree::flat(1, 0.0).unwrap();
        tree.add_height_map(&hm);
        assert_eq!(tree.height_at(1.0, 0.0), 4.0);

        tree.static_cull(0.001);
        assert_eq!(tree.height_at(1.0, 0.0), 4.0);
        let root = tree.node(tree.root());
        assert!(root.child(Quadrant::NorthWest).is_some());
        assert!(root.child(Quadrant::SouthEast).is_none());
    }

    #[test]
    fn test_flattened_edges_stay_shared() {
        let mut tree = seeded_tree(|x, z| ((x * 5 + z * 3) % 7) as f32 * 0.1);
        tree.static_cull(2.0);
        tree.for_each_node(|cd, node| {
            for dir in [Direction::East, Direction::South] {
                if let Some(s) = tree.neighbor(dir, cd) {
                    assert_eq!(
                        node.edge_vertex(dir).y,
                        tree.node(s).edge_vertex(dir.opposite()).y
                    );
                }
            }
        });
    }

    #[test]
    fn test_cull_clears_enabled_state() {
        let mut tree = seeded_tree(|x, _| x as f32);
        tree.static_cull(5.0);
        tree.for_each_node(|_, node| {
            assert!(node.enabled().is_empty());
            assert_eq!(node.sub_enabled_count(), [0, 0]);
        });
    }
}
