//! Quadtree geometry tables: edge directions, child quadrants and the
//! enabled-state bit layout.
//!
//! Child layout and vertex slots, with north towards -z:
//!
//! ```text
//!  children      corners       vertices
//!  +-+-+         1---0         +-2-+
//!  |1|0|         |   |         | | |
//!  +-+-+         |   |         3-0-1
//!  |2|3|         2---3         | | |
//!  +-+-+                       +-4-+
//! ```

/// Edge direction, also the index of the edge midpoint vertex minus one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    East = 0,
    North = 1,
    West = 2,
    South = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::West,
        Direction::South,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index & 3]
    }

    /// Direction pointing back across the same edge.
    pub fn opposite(self) -> Self {
        Self::from_index(self.index() ^ 2)
    }

    /// Slot of this edge's midpoint in a node's vertex array.
    pub fn vertex_slot(self) -> usize {
        1 + self.index()
    }

    /// East and south vertices are owned by the node; north and west are
    /// aliases of a neighbour's south and east. Only owned vertices carry a
    /// sub-enabled reference count.
    pub fn is_counted(self) -> bool {
        matches!(self, Direction::East | Direction::South)
    }

    /// Sub-enabled counter slot: 0 for the east/west axis, 1 for north/south.
    pub fn counter_slot(self) -> usize {
        self.index() & 1
    }
}

/// Child quadrant of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Quadrant {
    NorthEast = 0,
    NorthWest = 1,
    SouthWest = 2,
    SouthEast = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthEast,
        Quadrant::NorthWest,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    /// Visiting order used by the update pass and the static cull.
    pub const UPDATE_ORDER: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index & 3]
    }

    /// Quadrant holding the half-cell at `(ix, iz)`, each 0 or 1.
    pub fn from_cell(ix: usize, iz: usize) -> Self {
        const CELLS: [[Quadrant; 2]; 2] = [
            [Quadrant::NorthWest, Quadrant::NorthEast],
            [Quadrant::SouthWest, Quadrant::SouthEast],
        ];
        CELLS[iz & 1][ix & 1]
    }

    /// Slot of this quadrant in a node's error array.
    pub fn error_slot(self) -> usize {
        2 + self.index()
    }

    /// The two edge midpoints that must be enabled while this quadrant is
    /// subdivided: edge `i` and edge `i + 1`.
    pub fn bordering_edges(self) -> [Direction; 2] {
        [
            Direction::from_index(self.index()),
            Direction::from_index(self.index() + 1),
        ]
    }

    /// Whether this quadrant lies on the south half of its parent.
    pub fn is_south(self) -> bool {
        self.index() & 2 != 0
    }

    /// Whether this quadrant lies on the west half of its parent.
    pub fn is_west(self) -> bool {
        matches!(self, Quadrant::NorthWest | Quadrant::SouthWest)
    }

    /// Locate the same-size cell adjacent in `dir`.
    ///
    /// Returns the neighbour's quadrant index and whether it shares this
    /// cell's parent. When it does not, the neighbour is that quadrant of the
    /// parent's own neighbour in `dir`.
    pub fn neighbor(self, dir: Direction) -> (Quadrant, bool) {
        let ci = self.index();
        let d = dir.index();
        let index = ci ^ 1 ^ ((d & 1) << 1);
        let same_parent = (d.wrapping_sub(ci) & 2) != 0;
        (Quadrant::from_index(index), same_parent)
    }
}

const EDGE_BITS: [u8; 4] = [0x01, 0x02, 0x04, 0x08];
const CHILD_BITS: [u8; 4] = [0x10, 0x20, 0x40, 0x80];

/// Per-node activation state.
///
/// Bits 0-3 mark enabled edge vertices {E, N, W, S}; bits 4-7 mark active
/// children {NE, NW, SW, SE}.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnabledFlags(u8);

impl EnabledFlags {
    /// Flags from a raw bit pattern in the layout above.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn edge(self, dir: Direction) -> bool {
        self.0 & EDGE_BITS[dir.index()] != 0
    }

    pub fn set_edge(&mut self, dir: Direction, enabled: bool) {
        if enabled {
            self.0 |= EDGE_BITS[dir.index()];
        } else {
            self.0 &= !EDGE_BITS[dir.index()];
        }
    }

    pub fn child(self, quadrant: Quadrant) -> bool {
        self.0 & CHILD_BITS[quadrant.index()] != 0
    }

    pub fn set_child(&mut self, quadrant: Quadrant, active: bool) {
        if active {
            self.0 |= CHILD_BITS[quadrant.index()];
        } else {
            self.0 &= !CHILD_BITS[quadrant.index()];
        }
    }

    /// Number of active children.
    pub fn active_children(self) -> u32 {
        (self.0 >> 4).count_ones()
    }
}
