use ahash::AHashSet;
use std::fmt;

/// Coordinates of a single cell on the unbounded plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub x: i64,
    pub y: i64,
}

impl Cell {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The eight cells touching this one.
    pub fn neighbors(self) -> impl Iterator<Item = Cell> {
        const OFFSETS: [(i64, i64); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        OFFSETS
            .into_iter()
            .map(move |(dx, dy)| Cell::new(self.x.wrapping_add(dx), self.y.wrapping_add(dy)))
    }
}

impl From<(i64, i64)> for Cell {
    fn from((x, y): (i64, i64)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Inclusive bounding box of a non-empty cell set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl Bounds {
    /// Up to `2^64` when the box spans the whole `i64` range.
    pub fn width(&self) -> u128 {
        self.max_x.abs_diff(self.min_x) as u128 + 1
    }

    pub fn height(&self) -> u128 {
        self.max_y.abs_diff(self.min_y) as u128 + 1
    }

    /// Saturates at `u128::MAX` for a box spanning the whole plane.
    pub fn area(&self) -> u128 {
        self.width().saturating_mul(self.height())
    }
}

/// Order-independent fingerprint of a cell set.
///
/// Two sets holding the same coordinates hash equally no matter how they were
/// built; different sets collide with negligible probability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateHash(pub u128);

impl fmt::Display for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// splitmix64 finalizer
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

fn cell_digest(cell: Cell) -> (u64, u64) {
    let a = mix64((cell.x as u64).wrapping_add(0x9e3779b97f4a7c15));
    let b = mix64(a ^ (cell.y as u64).wrapping_mul(0xc2b2ae3d27d4eb4f));
    (b, mix64(b ^ 0xd6e8feb86659fd93))
}

/// Sparse set of live cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellSet {
    cells: AHashSet<Cell>,
}

impl CellSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: AHashSet::with_capacity(capacity),
        }
    }

    /// Fill a `width x height` rectangle at the origin with random cells.
    ///
    /// `seed` - random seed (if `None`, then random seed is generated)
    pub fn random(width: u32, height: u32, density: f64, seed: Option<u64>) -> Self {
        use rand::{Rng, SeedableRng};
        let mut rng = if let Some(x) = seed {
            rand_chacha::ChaCha8Rng::seed_from_u64(x)
        } else {
            rand_chacha::ChaCha8Rng::from_entropy()
        };
        let density = density.clamp(0., 1.);
        let mut set = Self::new();
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                if rng.gen_bool(density) {
                    set.insert(Cell::new(x, y));
                }
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    /// Returns `true` if the cell was not present.
    pub fn insert(&mut self, cell: Cell) -> bool {
        self.cells.insert(cell)
    }

    /// Returns `true` if the cell was present.
    pub fn remove(&mut self, cell: Cell) -> bool {
        self.cells.remove(&cell)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }

    /// Cells in row-major order, convenient for comparisons and display.
    pub fn sorted(&self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self.iter().collect();
        cells.sort_unstable_by_key(|c| (c.y, c.x));
        cells
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut iter = self.iter();
        let first = iter.next()?;
        let mut b = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for c in iter {
            b.min_x = b.min_x.min(c.x);
            b.min_y = b.min_y.min(c.y);
            b.max_x = b.max_x.max(c.x);
            b.max_y = b.max_y.max(c.y);
        }
        Some(b)
    }

    /// Same shape shifted so that its bounding box starts at the origin.
    pub fn normalized(&self) -> CellSet {
        match self.bounds() {
            Some(b) => self.translated(b.min_x.wrapping_neg(), b.min_y.wrapping_neg()),
            None => CellSet::new(),
        }
    }

    pub fn translated(&self, dx: i64, dy: i64) -> CellSet {
        self.iter()
            .map(|c| Cell::new(c.x.wrapping_add(dx), c.y.wrapping_add(dy)))
            .collect()
    }

    pub fn state_hash(&self) -> StateHash {
        let (mut sum, mut xor) = (0u64, 0u64);
        for cell in self.iter() {
            let (a, b) = cell_digest(cell);
            sum = sum.wrapping_add(a);
            xor ^= b;
        }
        let hi = mix64(sum ^ (self.len() as u64).rotate_left(17));
        let lo = mix64(xor.wrapping_add(self.len() as u64));
        StateHash((hi as u128) << 64 | lo as u128)
    }
}

impl FromIterator<Cell> for CellSet {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<(i64, i64)> for CellSet {
    fn from_iter<I: IntoIterator<Item = (i64, i64)>>(iter: I) -> Self {
        iter.into_iter().map(Cell::from).collect()
    }
}

impl Extend<Cell> for CellSet {
    fn extend<I: IntoIterator<Item = Cell>>(&mut self, iter: I) {
        self.cells.extend(iter);
    }
}

impl<'a> IntoIterator for &'a CellSet {
    type Item = Cell;
    type IntoIter = std::iter::Copied<std::collections::hash_set::Iter<'a, Cell>>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter().copied()
    }
}
