//! Quadtree storage and the traversal primitives shared by the update,
//! render and seeding passes.
//!
//! Nodes live in an index arena. Adjacency is never stored: neighbours are
//! found by walking the [`CornerContext`] chain, so creating or freeing nodes
//! can never leave a dangling neighbour link behind.

use std::ops::{Index, IndexMut};

use glam::Vec3;

use super::config::TerrainConfig;
use super::corner::{CornerContext, VertInfo};
use super::layout::{Direction, Quadrant};
use super::node::{QuadNode, CENTER, EAST_ERROR, SOUTH_ERROR};
use crate::core::{Error, Result};

/// Deepest supported root level. Keeps every world coordinate of the tree
/// exactly representable as `f32`.
pub const MAX_ROOT_LEVEL: u32 = 23;

/// Handle to a node in a [`QuadTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Slot storage with a free list. Freed slots are reused by later inserts.
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    slots: Vec<Option<QuadNode>>,
    free: Vec<u32>,
    live: usize,
}

impl NodeArena {
    pub(crate) fn insert(&mut self, node: QuadNode) -> NodeId {
        self.live += 1;
        if let Some(raw) = self.free.pop() {
            self.slots[raw as usize] = Some(node);
            return NodeId(raw);
        }
        let raw = self.slots.len() as u32;
        self.slots.push(Some(node));
        NodeId(raw)
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<QuadNode> {
        let node = self.slots.get_mut(id.index())?.take()?;
        self.live -= 1;
        self.free.push(id.0);
        Some(node)
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&QuadNode> {
        self.slots.get(id.index())?.as_ref()
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

impl Index<NodeId> for NodeArena {
    type Output = QuadNode;

    fn index(&self, id: NodeId) -> &QuadNode {
        self.get(id)
            .unwrap_or_else(|| panic!("terrain node {:?} was freed", id))
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut QuadNode {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("terrain node {:?} was freed", id))
    }
}

/// Adaptive quadtree terrain.
///
/// The root covers the square `[x_origin, x_origin + size] x [z_origin, z_origin + size]`
/// with `size = 2 << root_level`. Its four corners are fixed at construction.
#[derive(Debug)]
pub struct QuadTree {
    pub(crate) nodes: NodeArena,
    root: NodeId,
    root_level: u32,
    x_origin: i32,
    z_origin: i32,
    root_corners: [VertInfo; 4],
    pub(crate) vertical_scale: f32,
}

impl QuadTree {
    /// Create a single-node tree from its four corners {NE, NW, SW, SE}.
    pub fn new(
        root_level: u32,
        x_origin: i32,
        z_origin: i32,
        corners: [VertInfo; 4],
    ) -> Result<Self> {
        if root_level > MAX_ROOT_LEVEL {
            return Err(Error::Terrain(format!(
                "root level {} exceeds maximum {}",
                root_level, MAX_ROOT_LEVEL
            )));
        }
        let size = 2i32 << root_level;
        if x_origin.checked_add(size).is_none() || z_origin.checked_add(size).is_none() {
            return Err(Error::Terrain(format!(
                "origin ({}, {}) overflows with size {}",
                x_origin, z_origin, size
            )));
        }
        if corners.iter().any(|c| !c.y.is_finite() || !c.normal.is_finite()) {
            return Err(Error::Terrain("corner samples must be finite".into()));
        }

        let mut nodes = NodeArena::default();
        let root = nodes.insert(QuadNode::from_corners(&corners));
        log::debug!(
            "Created terrain root: level {}, {}x{} at ({}, {})",
            root_level, size, size, x_origin, z_origin
        );

        Ok(Self {
            nodes,
            root,
            root_level,
            x_origin,
            z_origin,
            root_corners: corners,
            vertical_scale: 1.0,
        })
    }

    /// Create a flat tree with all four corners at `height`.
    pub fn flat(root_level: u32, height: f32) -> Result<Self> {
        Self::new(root_level, 0, 0, [VertInfo::flat(height); 4])
    }

    /// Create a tree from configuration and four corner heights {NE, NW, SW, SE}.
    pub fn from_config(config: &TerrainConfig, corner_heights: [f32; 4]) -> Result<Self> {
        config.validate()?;
        let [x, z] = config.origin;
        let mut tree = Self::new(config.root_level, x, z, corner_heights.map(VertInfo::flat))?;
        tree.vertical_scale = config.vertical_scale;
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_level(&self) -> u32 {
        self.root_level
    }

    /// Edge length of the root square.
    pub fn size(&self) -> i32 {
        2 << self.root_level
    }

    pub fn origin(&self) -> (i32, i32) {
        (self.x_origin, self.z_origin)
    }

    pub fn vertical_scale(&self) -> f32 {
        self.vertical_scale
    }

    pub fn set_vertical_scale(&mut self, scale: f32) {
        self.vertical_scale = scale;
    }

    /// Traversal context of the root node.
    pub fn root_context(&self) -> CornerContext<'static> {
        CornerContext::root(
            self.root,
            self.root_level,
            self.x_origin,
            self.z_origin,
            self.root_corners,
        )
    }

    pub fn node(&self, id: NodeId) -> &QuadNode {
        &self.nodes[id]
    }

    /// Node lookup that tolerates freed handles.
    pub fn get(&self, id: NodeId) -> Option<&QuadNode> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut QuadNode {
        &mut self.nodes[id]
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes reachable from the root.
    pub fn count_nodes(&self) -> usize {
        self.count_aux(self.root)
    }

    fn count_aux(&self, id: NodeId) -> usize {
        1 + self.nodes[id]
            .children
            .iter()
            .flatten()
            .map(|&child| self.count_aux(child))
            .sum::<usize>()
    }

    /// Call `f` for every node reachable from the root, parents first, with
    /// the node's traversal context.
    pub fn for_each_node<F>(&self, mut f: F)
    where
        F: FnMut(&CornerContext<'_>, &QuadNode),
    {
        let root = self.root_context();
        self.visit_aux(&root, &mut f);
    }

    fn visit_aux<F>(&self, cd: &CornerContext<'_>, f: &mut F)
    where
        F: FnMut(&CornerContext<'_>, &QuadNode),
    {
        let node = &self.nodes[cd.node];
        f(cd, node);
        for quadrant in Quadrant::ALL {
            if let Some(child) = node.child(quadrant) {
                let q = cd.child(&node.vertices, quadrant, child);
                self.visit_aux(&q, f);
            }
        }
    }

    /// Same-size node adjacent to `cd` in `dir`, if it exists.
    ///
    /// Returns `None` at the edge of the tree or when the neighbour has not
    /// been materialized.
    pub fn neighbor(&self, dir: Direction, cd: &CornerContext<'_>) -> Option<NodeId> {
        let parent = cd.parent?;
        let (index, same_parent) = cd.quadrant.neighbor(dir);
        let p = if same_parent {
            parent.node
        } else {
            self.neighbor(dir, parent)?
        };
        self.nodes[p].child(index)
    }

    /// Create the child in `quadrant` if absent, returning its handle either way.
    pub(crate) fn create_child(&mut self, quadrant: Quadrant, cd: &CornerContext<'_>) -> NodeId {
        let parent = &self.nodes[cd.node];
        if let Some(child) = parent.child(quadrant) {
            return child;
        }
        let corners = cd.child_corners(&parent.vertices, quadrant);
        let child = self.nodes.insert(QuadNode::from_corners(&corners));
        self.nodes[cd.node].children[quadrant.index()] = Some(child);
        log::trace!(
            "Created node {:?} at level {} ({:?} of {:?})",
            child, cd.level.saturating_sub(1), quadrant, cd.node
        );
        child
    }

    /// Free a node and every descendant.
    pub(crate) fn free_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(id) {
            for child in node.children.into_iter().flatten() {
                self.free_subtree(child);
            }
            log::trace!("Freed node {:?}", id);
        }
    }

    /// Mark this node, and every ancestor not yet marked, as holding real data.
    pub fn set_static(&mut self, cd: &CornerContext<'_>) {
        let mut current = Some(cd);
        while let Some(ctx) = current {
            let node = &mut self.nodes[ctx.node];
            if node.is_static {
                break;
            }
            node.is_static = true;
            current = ctx.parent;
        }
    }

    /// Recompute errors, height bounds and lighting normals for this subtree.
    ///
    /// Every existing descendant is recomputed regardless of its dirty flag.
    /// Returns the largest error found in the subtree.
    pub fn recompute_error_and_lighting(&mut self, cd: &CornerContext<'_>) -> f32 {
        let id = cd.node;
        let c = cd.corners;
        let mut v = self.nodes[id].vertices;
        let children = self.nodes[id].children;
        let mut error = self.nodes[id].error;

        // The center is checked against the diagonal the parent's
        // triangulation uses for this quadrant.
        let diagonal = if cd.quadrant.index() & 1 != 0 {
            (c[1].y + c[3].y) * 0.5
        } else {
            (c[0].y + c[2].y) * 0.5
        };
        let mut max_error = (v[CENTER].y - diagonal).abs();

        let mut min_y = v[CENTER].y;
        let mut max_y = v[CENTER].y;
        for corner in &c {
            min_y = min_y.min(corner.y);
            max_y = max_y.max(corner.y);
        }

        error[EAST_ERROR] = (v[1].y - (c[0].y + c[3].y) * 0.5).abs();
        error[SOUTH_ERROR] = (v[4].y - (c[2].y + c[3].y) * 0.5).abs();
        max_error = max_error.max(error[EAST_ERROR]).max(error[SOUTH_ERROR]);

        for vert in &v[1..] {
            min_y = min_y.min(vert.y);
            max_y = max_y.max(vert.y);
        }

        for quadrant in Quadrant::ALL {
            let slot = quadrant.error_slot();
            if let Some(child) = children[quadrant.index()] {
                let q = cd.child(&v, quadrant, child);
                error[slot] = self.recompute_error_and_lighting(&q);
                let (child_min, child_max) = self.nodes[child].height_range();
                min_y = min_y.min(child_min);
                max_y = max_y.max(child_max);
            } else {
                error[slot] = self.nodes[id].diagonal_error(&c, quadrant);
            }
            max_error = max_error.max(error[slot]);
        }

        let inv_size = 1.0 / cd.whole() as f32;
        let neighbor_center = |dir: Direction, fallback: f32| {
            self.neighbor(dir, cd)
                .map_or(fallback, |n| self.nodes[n].vertices[CENTER].y)
        };
        let east = neighbor_center(Direction::East, v[1].y);
        let north = neighbor_center(Direction::North, v[2].y);
        let west = neighbor_center(Direction::West, v[3].y);
        let south = neighbor_center(Direction::South, v[4].y);

        v[0].normal = lightness((v[1].y - v[3].y) * inv_size, (v[4].y - v[2].y) * inv_size);
        v[1].normal = lightness((east - v[0].y) * inv_size, (c[3].y - c[0].y) * inv_size);
        v[2].normal = lightness((c[0].y - c[1].y) * inv_size, (v[0].y - north) * inv_size);
        v[3].normal = lightness((v[0].y - west) * inv_size, (c[2].y - c[1].y) * inv_size);
        v[4].normal = lightness((c[3].y - c[2].y) * inv_size, (south - v[0].y) * inv_size);

        let node = &mut self.nodes[id];
        node.vertices = v;
        node.error = error;
        node.min_y = min_y;
        node.max_y = max_y;
        node.dirty = false;

        max_error
    }

    /// Terrain height at world `(x, z)`.
    ///
    /// Descends into static children covering the point, otherwise
    /// interpolates bilinearly inside the current node. Points outside the
    /// root square, and non-finite coordinates, read as 0.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        if !x.is_finite() || !z.is_finite() {
            return 0.0;
        }
        let size = self.size() as f32;
        let lx = x - self.x_origin as f32;
        let lz = z - self.z_origin as f32;
        if lx < 0.0 || lz < 0.0 || lx > size || lz > size {
            return 0.0;
        }
        let root = self.root_context();
        self.height_aux(&root, x, z)
    }

    fn height_aux(&self, cd: &CornerContext<'_>, x: f32, z: f32) -> f32 {
        let half = cd.half() as f32;
        let lx = (x - cd.x_origin as f32) / half;
        let lz = (z - cd.z_origin as f32) / half;

        let ix = lx.floor().clamp(0.0, 1.0);
        let iz = lz.floor().clamp(0.0, 1.0);
        let quadrant = Quadrant::from_cell(ix as usize, iz as usize);

        let node = &self.nodes[cd.node];
        if let Some(child) = node.child(quadrant) {
            if self.nodes[child].is_static {
                let q = cd.child(&node.vertices, quadrant, child);
                return self.height_aux(&q, x, z);
            }
        }

        let fx = (lx - ix).clamp(0.0, 1.0);
        let fz = (lz - iz).clamp(0.0, 1.0);

        let v = &node.vertices;
        let c = &cd.corners;
        // Samples at (fx, fz) = (0,0), (1,0), (0,1), (1,1)
        let (s00, s01, s10, s11) = match quadrant {
            Quadrant::NorthEast => (v[2].y, c[0].y, v[0].y, v[1].y),
            Quadrant::NorthWest => (c[1].y, v[2].y, v[3].y, v[0].y),
            Quadrant::SouthWest => (v[3].y, v[0].y, c[2].y, v[4].y),
            Quadrant::SouthEast => (v[0].y, v[1].y, v[4].y, c[3].y),
        };

        (s00 * (1.0 - fx) + s01 * fx) * (1.0 - fz) + (s10 * (1.0 - fx) + s11 * fx) * fz
    }

    /// Clear every enabled flag and counter, free all non-static nodes and
    /// mark the survivors dirty.
    pub fn reset_tree(&mut self) {
        let before = self.nodes.len();
        self.reset_aux(self.root);
        log::debug!("Reset terrain: {} -> {} nodes", before, self.nodes.len());
    }

    fn reset_aux(&mut self, id: NodeId) {
        let children = self.nodes[id].children;
        for (index, child) in children.into_iter().enumerate() {
            if let Some(child) = child {
                self.reset_aux(child);
                if !self.nodes[child].is_static {
                    self.free_subtree(child);
                    self.nodes[id].children[index] = None;
                }
            }
        }
        let node = &mut self.nodes[id];
        node.enabled = Default::default();
        node.sub_enabled_count = [0; 2];
        node.dirty = true;
    }
}

/// Shading normal from finite-difference slopes.
fn lightness(x_slope: f32, z_slope: f32) -> Vec3 {
    Vec3::new(x_slope, 1.0, z_slope).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_children(level: u32) -> QuadTree {
        let mut tree = QuadTree::flat(level, 0.0).unwrap();
        let root = tree.root_context();
        for quadrant in Quadrant::ALL {
            tree.create_child(quadrant, &root);
        }
        tree
    }

    #[test]
    fn test_flat_tree_is_zero_everywhere() {
        let mut tree = QuadTree::flat(4, 0.0).unwrap();
        let root = tree.root_context();
        assert_eq!(tree.recompute_error_and_lighting(&root), 0.0);

        let node = tree.node(tree.root());
        assert!(node.vertices().iter().all(|v| v.y == 0.0));
        assert_eq!(node.error(), &[0.0; 6]);

        for &(x, z) in &[(0.0, 0.0), (7.5, 3.25), (32.0, 32.0), (-10.0, 5.0), (100.0, 100.0)] {
            assert_eq!(tree.height_at(x, z), 0.0);
        }
        assert_eq!(tree.height_at(f32::NAN, 1.0), 0.0);
    }

    #[test]
    fn test_rejects_deep_root() {
        assert!(matches!(QuadTree::flat(MAX_ROOT_LEVEL + 1, 0.0), Err(Error::Terrain(_))));
        assert!(QuadTree::flat(MAX_ROOT_LEVEL, 0.0).is_ok());
    }

    #[test]
    fn test_rejects_non_finite_corners() {
        let corners = [
            VertInfo::flat(f32::NAN),
            VertInfo::flat(0.0),
            VertInfo::flat(0.0),
            VertInfo::flat(0.0),
        ];
        assert!(QuadTree::new(3, 0, 0, corners).is_err());
    }

    #[test]
    fn test_height_at_interpolates_corners() {
        // NE, NW, SW, SE: height rises with x
        let corners = [
            VertInfo::flat(16.0),
            VertInfo::flat(0.0),
            VertInfo::flat(0.0),
            VertInfo::flat(16.0),
        ];
        let tree = QuadTree::new(3, 0, 0, corners).unwrap();
        assert_eq!(tree.height_at(0.0, 5.0), 0.0);
        assert_eq!(tree.height_at(8.0, 2.0), 8.0);
        assert_eq!(tree.height_at(12.0, 12.0), 12.0);
        assert_eq!(tree.height_at(16.0, 16.0), 16.0);
    }

    #[test]
    fn test_neighbors_between_siblings() {
        let tree = tree_with_children(3);
        let root = tree.root_context();
        let root_node = tree.node(tree.root());
        let ne = root_node.child(Quadrant::NorthEast).unwrap();
        let nw = root_node.child(Quadrant::NorthWest).unwrap();
        let se = root_node.child(Quadrant::SouthEast).unwrap();

        let nw_cd = root.child(root_node.vertices(), Quadrant::NorthWest, nw);
        assert_eq!(tree.neighbor(Direction::East, &nw_cd), Some(ne));
        assert_eq!(tree.neighbor(Direction::West, &nw_cd), None);
        assert_eq!(tree.neighbor(Direction::North, &nw_cd), None);

        let ne_cd = root.child(root_node.vertices(), Quadrant::NorthEast, ne);
        assert_eq!(tree.neighbor(Direction::South, &ne_cd), Some(se));
        assert_eq!(tree.neighbor(Direction::West, &ne_cd), Some(nw));
        assert_eq!(tree.neighbor(Direction::North, &root), None);
    }

    #[test]
    fn test_neighbor_across_parents() {
        let mut tree = tree_with_children(3);
        let root = tree.root_context();
        let (nw, ne) = {
            let node = tree.node(tree.root());
            (node.child(Quadrant::NorthWest).unwrap(), node.child(Quadrant::NorthEast).unwrap())
        };
        let verts = *tree.node(tree.root()).vertices();
        let nw_cd = root.child(&verts, Quadrant::NorthWest, nw);
        let ne_cd = root.child(&verts, Quadrant::NorthEast, ne);
        let nw_ne = tree.create_child(Quadrant::NorthEast, &nw_cd);
        let ne_nw = tree.create_child(Quadrant::NorthWest, &ne_cd);

        let nw_verts = *tree.node(nw).vertices();
        let cd = nw_cd.child(&nw_verts, Quadrant::NorthEast, nw_ne);
        assert_eq!(tree.neighbor(Direction::East, &cd), Some(ne_nw));
        // The eastern sibling has no south-west child.
        let se_cd = nw_cd.child(&nw_verts, Quadrant::SouthEast, nw_ne);
        assert_eq!(tree.neighbor(Direction::East, &se_cd), None);
    }

    #[test]
    fn test_set_static_propagates_up() {
        let mut tree = tree_with_children(3);
        let root = tree.root_context();
        let verts = *tree.node(tree.root()).vertices();
        let sw = tree.node(tree.root()).child(Quadrant::SouthWest).unwrap();
        let sw_cd = root.child(&verts, Quadrant::SouthWest, sw);
        let leaf = tree.create_child(Quadrant::SouthEast, &sw_cd);
        let sw_verts = *tree.node(sw).vertices();
        let leaf_cd = sw_cd.child(&sw_verts, Quadrant::SouthEast, leaf);

        tree.set_static(&leaf_cd);
        assert!(tree.node(leaf).is_static());
        assert!(tree.node(sw).is_static());
        assert!(tree.node(tree.root()).is_static());
        let ne = tree.node(tree.root()).child(Quadrant::NorthEast).unwrap();
        assert!(!tree.node(ne).is_static());
    }

    #[test]
    fn test_reset_keeps_static_nodes() {
        let mut tree = tree_with_children(3);
        let root = tree.root_context();
        let verts = *tree.node(tree.root()).vertices();
        let sw = tree.node(tree.root()).child(Quadrant::SouthWest).unwrap();
        tree.set_static(&root.child(&verts, Quadrant::SouthWest, sw));
        tree.node_mut(tree.root()).enabled.set_child(Quadrant::SouthWest, true);
        tree.node_mut(tree.root()).sub_enabled_count = [1, 1];
        assert_eq!(tree.count_nodes(), 5);

        tree.reset_tree();
        let root_node = tree.node(tree.root());
        assert_eq!(root_node.child(Quadrant::SouthWest), Some(sw));
        assert_eq!(root_node.child(Quadrant::NorthEast), None);
        assert!(root_node.enabled().is_empty());
        assert_eq!(root_node.sub_enabled_count(), [0, 0]);
        assert!(root_node.is_dirty());
        assert_eq!(tree.count_nodes(), 2);
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_arena_reuses_freed_slots() {
        let mut tree = tree_with_children(3);
        let ne = tree.node(tree.root()).child(Quadrant::NorthEast).unwrap();
        tree.free_subtree(ne);
        tree.node_mut(tree.root()).children[Quadrant::NorthEast.index()] = None;
        assert!(tree.get(ne).is_none());
        assert_eq!(tree.node_count(), 4);

        let root = tree.root_context();
        let again = tree.create_child(Quadrant::NorthEast, &root);
        assert_eq!(again, ne);
        assert_eq!(tree.node_count(), 5);
    }

    #[test]
    fn test_recompute_bounds_cover_descendants() {
        let mut tree = tree_with_children(3);
        let root = tree.root_context();
        let se = tree.node(tree.root()).child(Quadrant::SouthEast).unwrap();
        tree.node_mut(se).vertices[CENTER].y = 5.0;
        let nw = tree.node(tree.root()).child(Quadrant::NorthWest).unwrap();
        tree.node_mut(nw).vertices[1].y = -3.0;

        let max_error = tree.recompute_error_and_lighting(&root);
        assert_eq!(tree.node(tree.root()).height_range(), (-3.0, 5.0));
        assert!(max_error >= 5.0);
        assert_eq!(tree.node(tree.root()).error()[Quadrant::SouthEast.error_slot()], 5.0);

        tree.for_each_node(|cd, node| {
            let (min_y, max_y) = node.height_range();
            for v in node.vertices() {
                assert!(min_y <= v.y && v.y <= max_y, "node at level {}", cd.level);
            }
        });
    }

    #[test]
    fn test_recompute_lighting_tilts_normals() {
        let corners = [
            VertInfo::flat(16.0),
            VertInfo::flat(0.0),
            VertInfo::flat(0.0),
            VertInfo::flat(16.0),
        ];
        let mut tree = QuadTree::new(3, 0, 0, corners).unwrap();
        let root = tree.root_context();
        tree.recompute_error_and_lighting(&root);
        let center = tree.node(tree.root()).center();
        // Slope of 1 along x: normal leans towards +x with no z component.
        assert!(center.normal.x > 0.0);
        assert!(center.normal.z.abs() < 1e-6);
        assert!((center.normal.length() - 1.0).abs() < 1e-5);
    }
}
