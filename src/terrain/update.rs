//! View-dependent update pass.
//!
//! Each frame the tree is walked top-down. Edge vertices and child quadrants
//! are switched on when the viewer is close relative to their error, and
//! switched off again once nothing depends on them. Enabling an edge vertex
//! also enables its alias on the neighbouring node, creating intermediate
//! nodes where needed so the shared edge never cracks.

use glam::Vec3;

use super::corner::CornerContext;
use super::layout::{Direction, EnabledFlags, Quadrant};
use super::node::{EAST_ERROR, SOUTH_ERROR};
use super::tree::{NodeId, QuadTree, MAX_ROOT_LEVEL};
use crate::math::Aabb;

/// Viewer state for one update pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodView {
    pub viewer: Vec3,
    /// Scales errors into view distances; higher keeps more detail.
    pub detail_threshold: f32,
}

impl LodView {
    pub fn new(viewer: Vec3, detail_threshold: f32) -> Self {
        Self { viewer, detail_threshold }
    }

    /// Whether a vertex at `position` with the given error should be enabled.
    pub fn vertex_test(&self, position: Vec3, error: f32) -> bool {
        let d = (position - self.viewer).abs().max_element();
        error * self.detail_threshold > d
    }

    /// Whether anything inside `bounds` with the given error could be enabled.
    pub fn box_test(&self, bounds: &Aabb, error: f32) -> bool {
        error * self.detail_threshold > bounds.chebyshev_distance(self.viewer)
    }
}

impl QuadTree {
    /// Refresh enabled states for a viewer at `viewer`. Larger `detail`
    /// values refine more aggressively.
    pub fn update(&mut self, viewer: Vec3, detail: f32) {
        let view = LodView::new(viewer, detail * self.vertical_scale);
        let root = self.root_context();
        self.update_aux(&root, &view, 0.0);
        log::debug!(
            "Terrain update at {:?} (detail {}): {} nodes",
            viewer, detail, self.node_count()
        );
    }

    fn update_aux(&mut self, cd: &CornerContext<'_>, view: &LodView, center_error: f32) {
        let id = cd.node;
        if self.nodes[id].dirty {
            self.recompute_error_and_lighting(cd);
        }

        let half = cd.half();
        let whole = cd.whole();

        // Enable the owned edge vertices. North and west are the aliases of
        // the neighbours' south and east and are handled from there.
        let node = &self.nodes[id];
        let east = cd.point(whole, half, node.vertices[1].y);
        let south = cd.point(half, whole, node.vertices[4].y);
        let (east_error, south_error) = (node.error[EAST_ERROR], node.error[SOUTH_ERROR]);

        if !self.nodes[id].enabled.edge(Direction::East) && view.vertex_test(east, east_error) {
            self.enable_edge_vertex(Direction::East, false, cd);
        }
        if !self.nodes[id].enabled.edge(Direction::South) && view.vertex_test(south, south_error) {
            self.enable_edge_vertex(Direction::South, false, cd);
        }

        if cd.level > 0 {
            for quadrant in Quadrant::UPDATE_ORDER {
                let node = &self.nodes[id];
                if node.enabled.child(quadrant) {
                    continue;
                }
                let (x, z) = cd.child_origin(quadrant);
                let bounds =
                    Aabb::from_square(x as f32, z as f32, half as f32, node.min_y, node.max_y);
                if view.box_test(&bounds, node.error[quadrant.error_slot()]) {
                    self.enable_child(quadrant, cd);
                }
            }

            for quadrant in Quadrant::UPDATE_ORDER {
                let node = &self.nodes[id];
                if !node.enabled.child(quadrant) {
                    continue;
                }
                let child_error = node.error[quadrant.error_slot()];
                let vertices = node.vertices;
                match node.child(quadrant) {
                    Some(child) => {
                        let q = cd.child(&vertices, quadrant, child);
                        self.update_aux(&q, view, child_error);
                    }
                    None => debug_assert!(false, "active quadrant {:?} has no node", quadrant),
                }
            }
        }

        // Disable edge vertices no child on either side depends on.
        let node = &self.nodes[id];
        if node.enabled.edge(Direction::East)
            && node.sub_enabled_count[0] == 0
            && !view.vertex_test(east, node.error[EAST_ERROR])
        {
            self.nodes[id].enabled.set_edge(Direction::East, false);
            if let Some(s) = self.neighbor(Direction::East, cd) {
                self.nodes[s].enabled.set_edge(Direction::West, false);
            }
        }

        let node = &self.nodes[id];
        if node.enabled.edge(Direction::South)
            && node.sub_enabled_count[1] == 0
            && !view.vertex_test(south, node.error[SOUTH_ERROR])
        {
            self.nodes[id].enabled.set_edge(Direction::South, false);
            if let Some(s) = self.neighbor(Direction::South, cd) {
                self.nodes[s].enabled.set_edge(Direction::North, false);
            }
        }

        // North and west vertices on the tree border have no neighbour to
        // clear them; release them once no child depends on them.
        for dir in [Direction::North, Direction::West] {
            let node = &self.nodes[id];
            if node.enabled.edge(dir)
                && !border_vertex_in_use(node.enabled, dir)
                && self.neighbor(dir, cd).is_none()
            {
                self.nodes[id].enabled.set_edge(dir, false);
            }
        }

        let node = &self.nodes[id];
        if node.enabled.is_empty() {
            if let Some(parent) = cd.parent {
                let bounds = Aabb::from_square(
                    cd.x_origin as f32,
                    cd.z_origin as f32,
                    whole as f32,
                    node.min_y,
                    node.max_y,
                );
                if !view.box_test(&bounds, center_error) {
                    // May free this node; nothing below touches it again.
                    self.notify_child_disable(parent, cd.quadrant);
                }
            }
        }
    }

    /// Enable the edge vertex on `dir` and its alias on the adjacent node.
    ///
    /// With `increment_count`, east and south vertices (on either side) also
    /// gain a dependent in their sub-enabled counter.
    pub(crate) fn enable_edge_vertex(
        &mut self,
        dir: Direction,
        increment_count: bool,
        cd: &CornerContext<'_>,
    ) {
        let node = &mut self.nodes[cd.node];
        if node.enabled.edge(dir) && !increment_count {
            return;
        }
        node.enabled.set_edge(dir, true);
        if increment_count && dir.is_counted() {
            node.sub_enabled_count[dir.counter_slot()] += 1;
        }

        // Walk up to the ancestor shared with the neighbour, recording the
        // neighbour-side child index at each step.
        let mut path = [Quadrant::NorthEast; MAX_ROOT_LEVEL as usize + 1];
        let mut depth = 0;
        let mut pcd = cd;
        loop {
            let Some(parent) = pcd.parent else {
                // The neighbour would lie outside the tree.
                return;
            };
            let (index, same_parent) = pcd.quadrant.neighbor(dir);
            path[depth] = index;
            depth += 1;
            pcd = parent;
            if same_parent {
                break;
            }
        }

        let neighbor = self.enable_descendant(&path[..depth], pcd);

        let alias = dir.opposite();
        let node = &mut self.nodes[neighbor];
        node.enabled.set_edge(alias, true);
        if increment_count && alias.is_counted() {
            node.sub_enabled_count[alias.counter_slot()] += 1;
        }
    }

    /// Follow `path` (innermost step first) down from `cd`, enabling and
    /// creating each child on the way. Returns the node at the end.
    pub(crate) fn enable_descendant(
        &mut self,
        path: &[Quadrant],
        cd: &CornerContext<'_>,
    ) -> NodeId {
        let Some((&quadrant, rest)) = path.split_last() else {
            return cd.node;
        };

        if !self.nodes[cd.node].enabled.child(quadrant) {
            self.enable_child(quadrant, cd);
        }
        let child = self.create_child(quadrant, cd);

        if rest.is_empty() {
            return child;
        }
        let vertices = self.nodes[cd.node].vertices;
        let q = cd.child(&vertices, quadrant, child);
        self.enable_descendant(rest, &q)
    }

    /// Activate `quadrant`, enabling the two edge vertices it depends on and
    /// creating the child node if needed.
    pub(crate) fn enable_child(&mut self, quadrant: Quadrant, cd: &CornerContext<'_>) {
        if self.nodes[cd.node].enabled.child(quadrant) {
            return;
        }
        self.nodes[cd.node].enabled.set_child(quadrant, true);
        for edge in quadrant.bordering_edges() {
            self.enable_edge_vertex(edge, true, cd);
        }
        self.create_child(quadrant, cd);
    }

    /// Deactivate `quadrant` of the node at `cd`, release its hold on the
    /// bordering edge vertices and free the child unless it is static.
    pub(crate) fn notify_child_disable(&mut self, cd: &CornerContext<'_>, quadrant: Quadrant) {
        self.nodes[cd.node].enabled.set_child(quadrant, false);

        // North/south edge: our south vertex, or the northern neighbour's.
        let s = if quadrant.is_south() {
            Some(cd.node)
        } else {
            self.neighbor(Direction::North, cd)
        };
        if let Some(s) = s {
            self.release_vertex(s, 1);
        }

        // East/west edge: the western neighbour's east vertex, or ours.
        let s = if quadrant.is_west() {
            self.neighbor(Direction::West, cd)
        } else {
            Some(cd.node)
        };
        if let Some(s) = s {
            self.release_vertex(s, 0);
        }

        if let Some(child) = self.nodes[cd.node].child(quadrant) {
            if !self.nodes[child].is_static {
                self.free_subtree(child);
                self.nodes[cd.node].children[quadrant.index()] = None;
            }
        }
    }

    fn release_vertex(&mut self, id: NodeId, slot: usize) {
        let count = &mut self.nodes[id].sub_enabled_count[slot];
        debug_assert!(*count > 0, "sub-enabled count underflow on {:?}", id);
        *count = count.saturating_sub(1);
    }
}

/// Whether an active child borders the edge vertex on `dir`.
fn border_vertex_in_use(flags: EnabledFlags, dir: Direction) -> bool {
    Quadrant::ALL
        .into_iter()
        .any(|q| flags.child(q) && q.bordering_edges().contains(&dir))
}
