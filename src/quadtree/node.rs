#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeIdx(pub u32);

impl NodeIdx {
    /// Blank node of any size; never stored in the hashtables.
    pub const BLANK: NodeIdx = NodeIdx(0);
}

#[derive(Clone, Copy, Default)]
pub struct QuadTreeNode {
    pub nw: NodeIdx,
    pub ne: NodeIdx,
    pub sw: NodeIdx,
    pub se: NodeIdx,
    pub population: u64,
}

impl QuadTreeNode {
    /// Leaves keep their 64 cells in `nw` (rows 0..4) and `ne` (rows 4..8).
    pub fn leaf(cells: u64) -> Self {
        Self {
            nw: NodeIdx(cells as u32),
            ne: NodeIdx((cells >> 32) as u32),
            sw: NodeIdx::BLANK,
            se: NodeIdx::BLANK,
            population: cells.count_ones() as u64,
        }
    }

    pub fn leaf_cells(&self) -> u64 {
        self.nw.0 as u64 | (self.ne.0 as u64) << 32
    }

    /// Returns the cells of a leaf node row by row; bit `x` of byte `y` is cell `(x, y)`.
    pub fn leaf_rows(&self) -> [u8; 8] {
        self.leaf_cells().to_le_bytes()
    }

    pub fn children(&self) -> [NodeIdx; 4] {
        [self.nw, self.ne, self.sw, self.se]
    }
}
