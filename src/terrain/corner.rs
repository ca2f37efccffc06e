//! Per-traversal corner context.
//!
//! A `CornerContext` is rebuilt on every descent from the parent's context and
//! the parent node's five vertices. It holds copies of the four corner samples
//! plus the node's place in the tree, so children can be positioned and
//! interpolated without storing world coordinates in the nodes themselves.

use glam::Vec3;

use super::layout::Quadrant;
use super::tree::NodeId;

/// Height sample with its lighting normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertInfo {
    pub y: f32,
    pub normal: Vec3,
}

impl Default for VertInfo {
    fn default() -> Self {
        Self { y: 0.0, normal: Vec3::Y }
    }
}

impl VertInfo {
    pub fn new(y: f32, normal: Vec3) -> Self {
        Self { y, normal }
    }

    /// Flat sample at height `y`, normal pointing straight up.
    pub fn flat(y: f32) -> Self {
        Self { y, normal: Vec3::Y }
    }

    /// Midpoint of two samples, normal renormalized.
    pub fn midpoint(a: &VertInfo, b: &VertInfo) -> Self {
        Self {
            y: 0.5 * (a.y + b.y),
            normal: unit_or_up(a.normal + b.normal),
        }
    }
}

/// Normalize, falling back to +Y when the vector is degenerate.
pub(crate) fn unit_or_up(v: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(Vec3::Y)
}

/// Traversal record for one node.
///
/// Lives on the call stack only; `parent` points at the caller's context.
#[derive(Clone, Copy, Debug)]
pub struct CornerContext<'a> {
    pub parent: Option<&'a CornerContext<'a>>,
    pub node: NodeId,
    /// Which child of the parent this is. Meaningless for the root.
    pub quadrant: Quadrant,
    pub level: u32,
    pub x_origin: i32,
    pub z_origin: i32,
    /// Corner samples {NE, NW, SW, SE}.
    pub corners: [VertInfo; 4],
}

impl<'a> CornerContext<'a> {
    pub fn root(
        node: NodeId,
        level: u32,
        x_origin: i32,
        z_origin: i32,
        corners: [VertInfo; 4],
    ) -> Self {
        Self {
            parent: None,
            node,
            quadrant: Quadrant::NorthEast,
            level,
            x_origin,
            z_origin,
            corners,
        }
    }

    /// Half the edge length of this node.
    pub fn half(&self) -> i32 {
        1 << self.level
    }

    /// Edge length of this node.
    pub fn whole(&self) -> i32 {
        2 << self.level
    }

    /// World origin of `quadrant` within this node.
    pub fn child_origin(&self, quadrant: Quadrant) -> (i32, i32) {
        let half = self.half();
        match quadrant {
            Quadrant::NorthEast => (self.x_origin + half, self.z_origin),
            Quadrant::NorthWest => (self.x_origin, self.z_origin),
            Quadrant::SouthWest => (self.x_origin, self.z_origin + half),
            Quadrant::SouthEast => (self.x_origin + half, self.z_origin + half),
        }
    }

    /// Corners inherited by `quadrant`, given this node's vertices.
    ///
    /// Each child keeps one of the parent's corners (the one it shares) and
    /// takes the other three from the parent's center and edge midpoints.
    pub fn child_corners(&self, vertices: &[VertInfo; 5], quadrant: Quadrant) -> [VertInfo; 4] {
        let [center, east, north, west, south] = *vertices;
        let c = &self.corners;
        match quadrant {
            Quadrant::NorthEast => [c[0], north, center, east],
            Quadrant::NorthWest => [north, c[1], west, center],
            Quadrant::SouthWest => [center, west, c[2], south],
            Quadrant::SouthEast => [east, center, south, c[3]],
        }
    }

    /// Context for the child `node` occupying `quadrant`.
    pub fn child<'s>(
        &'s self,
        vertices: &[VertInfo; 5],
        quadrant: Quadrant,
        node: NodeId,
    ) -> CornerContext<'s> {
        debug_assert!(self.level > 0, "level-0 nodes have no children");
        let (x_origin, z_origin) = self.child_origin(quadrant);
        CornerContext {
            parent: Some(self),
            node,
            quadrant,
            level: self.level - 1,
            x_origin,
            z_origin,
            corners: self.child_corners(vertices, quadrant),
        }
    }

    /// World-space position of a point in this node's square at height `y`.
    pub fn point(&self, dx: i32, dz: i32, y: f32) -> Vec3 {
        Vec3::new((self.x_origin + dx) as f32, y, (self.z_origin + dz) as f32)
    }
}

/// Parent layout recovered from the four child contexts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParentLayout {
    pub level: u32,
    pub x_origin: i32,
    pub z_origin: i32,
    pub corners: [VertInfo; 4],
    pub vertices: [VertInfo; 5],
}

/// Inverse of [`CornerContext::child_corners`]: rebuild the parent's corners,
/// vertices and origin from its four children, given in quadrant order.
pub fn reconstruct_parent(children: &[CornerContext<'_>; 4]) -> ParentLayout {
    let [ne, nw, sw, se] = children;
    ParentLayout {
        level: nw.level + 1,
        x_origin: nw.x_origin,
        z_origin: nw.z_origin,
        corners: [ne.corners[0], nw.corners[1], sw.corners[2], se.corners[3]],
        vertices: [
            ne.corners[2],
            ne.corners[3],
            ne.corners[1],
            nw.corners[2],
            sw.corners[3],
        ],
    }
}
