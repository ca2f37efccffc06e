//! Quadtree node.

use super::corner::{unit_or_up, VertInfo};
use super::layout::{Direction, EnabledFlags, Quadrant};
use super::tree::NodeId;

/// Vertex slot of the center sample.
pub const CENTER: usize = 0;

/// Error slot of the east edge vertex.
pub const EAST_ERROR: usize = 0;
/// Error slot of the south edge vertex.
pub const SOUTH_ERROR: usize = 1;

/// One square patch of terrain.
///
/// Holds the center and four edge-midpoint samples; the corners are owned by
/// ancestors and reach the node through its [`CornerContext`](super::CornerContext).
#[derive(Clone, Debug)]
pub struct QuadNode {
    /// Children {NE, NW, SW, SE}, exclusively owned
    pub(crate) children: [Option<NodeId>; 4],
    /// {center, E, N, W, S}
    pub(crate) vertices: [VertInfo; 5],
    pub(crate) enabled: EnabledFlags,
    /// Active dependents of the east [0] and south [1] vertices
    pub(crate) sub_enabled_count: [u32; 2],
    /// East edge, south edge, then one slot per child quadrant
    pub(crate) error: [f32; 6],
    pub(crate) min_y: f32,
    pub(crate) max_y: f32,
    pub(crate) is_static: bool,
    pub(crate) dirty: bool,
}

impl QuadNode {
    /// Build a node by bilinear interpolation of its four corners.
    pub fn from_corners(corners: &[VertInfo; 4]) -> Self {
        let [ne, nw, sw, se] = corners;

        let center = VertInfo {
            y: 0.25 * (ne.y + nw.y + sw.y + se.y),
            normal: unit_or_up(ne.normal + nw.normal + sw.normal + se.normal),
        };
        let vertices = [
            center,
            VertInfo::midpoint(se, ne),
            VertInfo::midpoint(ne, nw),
            VertInfo::midpoint(nw, sw),
            VertInfo::midpoint(sw, se),
        ];

        let mut node = Self {
            children: [None; 4],
            vertices,
            enabled: EnabledFlags::default(),
            sub_enabled_count: [0; 2],
            error: [0.0; 6],
            min_y: corners.iter().map(|c| c.y).fold(f32::INFINITY, f32::min),
            max_y: corners.iter().map(|c| c.y).fold(f32::NEG_INFINITY, f32::max),
            is_static: false,
            dirty: false,
        };
        for quadrant in Quadrant::ALL {
            node.error[quadrant.error_slot()] = node.diagonal_error(corners, quadrant);
        }
        node
    }

    /// Quarter of the gap between the quadrant's two diagonals: center plus
    /// outer corner against the two bordering edge midpoints.
    pub(crate) fn diagonal_error(&self, corners: &[VertInfo; 4], quadrant: Quadrant) -> f32 {
        let [a, b] = quadrant.bordering_edges();
        let along = self.vertices[CENTER].y + corners[quadrant.index()].y;
        let across = self.vertices[a.vertex_slot()].y + self.vertices[b.vertex_slot()].y;
        (along - across).abs() * 0.25
    }

    pub fn child(&self, quadrant: Quadrant) -> Option<NodeId> {
        self.children[quadrant.index()]
    }

    pub fn children(&self) -> &[Option<NodeId>; 4] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    pub fn vertices(&self) -> &[VertInfo; 5] {
        &self.vertices
    }

    pub fn center(&self) -> VertInfo {
        self.vertices[CENTER]
    }

    /// Midpoint sample on edge `dir`.
    pub fn edge_vertex(&self, dir: Direction) -> VertInfo {
        self.vertices[dir.vertex_slot()]
    }

    pub fn enabled(&self) -> EnabledFlags {
        self.enabled
    }

    pub fn sub_enabled_count(&self) -> [u32; 2] {
        self.sub_enabled_count
    }

    pub fn error(&self) -> &[f32; 6] {
        &self.error
    }

    /// Vertical extent of this node and its descendants.
    pub fn height_range(&self) -> (f32, f32) {
        (self.min_y, self.max_y)
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_flat_corners() {
        let node = QuadNode::from_corners(&[VertInfo::flat(0.0); 4]);
        assert!(node.vertices.iter().all(|v| v.y == 0.0 && v.normal == Vec3::Y));
        assert_eq!(node.error, [0.0; 6]);
        assert_eq!(node.height_range(), (0.0, 0.0));
        assert!(!node.is_static());
        assert!(!node.is_dirty());
        assert!(!node.has_children());
    }

    #[test]
    fn test_interpolated_vertices() {
        let corners = [
            VertInfo::flat(4.0),
            VertInfo::flat(0.0),
            VertInfo::flat(8.0),
            VertInfo::flat(12.0),
        ];
        let node = QuadNode::from_corners(&corners);
        assert_eq!(node.center().y, 6.0);
        assert_eq!(node.edge_vertex(Direction::East).y, 8.0);
        assert_eq!(node.edge_vertex(Direction::North).y, 2.0);
        assert_eq!(node.edge_vertex(Direction::West).y, 4.0);
        assert_eq!(node.edge_vertex(Direction::South).y, 10.0);
        assert_eq!(node.height_range(), (0.0, 12.0));
    }

    #[test]
    fn test_saddle_quadrant_error() {
        // Opposite corners raised: the quadrant diagonals disagree.
        let corners = [
            VertInfo::flat(8.0),
            VertInfo::flat(0.0),
            VertInfo::flat(8.0),
            VertInfo::flat(0.0),
        ];
        let node = QuadNode::from_corners(&corners);
        // center 4, all edges 4: |(4 + 8) - (4 + 4)| / 4 = 1 for raised corners
        assert_eq!(node.error[Quadrant::NorthEast.error_slot()], 1.0);
        assert_eq!(node.error[Quadrant::SouthWest.error_slot()], 1.0);
        assert_eq!(node.error[Quadrant::NorthWest.error_slot()], 1.0);
        assert_eq!(node.error[EAST_ERROR], 0.0);
        assert_eq!(node.error[SOUTH_ERROR], 0.0);
    }
}
