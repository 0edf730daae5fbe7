use super::{MemoryManager, NodeIdx, LEAF_SIZE, LEAF_SIZE_LOG2};
use crate::{Advance, Cell, CellSet, Config, EngineAdapter, Error, NaiveEngine, Result, Rule};
use ahash::AHashMap as HashMap;
use tracing::debug;

/// Largest quadtree the engine builds.
const MAX_SIDE_LOG2: u32 = 62;

/// Generations stepped cell by cell per run once a pattern outgrows the
/// quadtree; the rest is reported as not advanced.
const FALLBACK_GENERATIONS: u64 = 1 << 10;

/// Root of a quadtree placed on the plane.
struct Field {
    root: NodeIdx,
    size_log2: u32,
    // coordinates of the top-left corner
    x: i128,
    y: i128,
}

/// Implementation of [HashLife algorithm](https://conwaylife.com/wiki/HashLife)
/// for any Life-like rule without `B0`.
///
/// Nodes and memoized updates survive between runs with the same rule, so
/// patterns that keep reappearing get cheaper to advance.
pub struct HashLifeEngine {
    mem: MemoryManager,
    rule: Rule,
    memory_cap_log2: u32,
    // patterns wider than `2^MAX_SIDE_LOG2` are stepped here
    fallback: NaiveEngine,
    runs: u64,
    generations_total: u128,
}

impl Default for HashLifeEngine {
    fn default() -> Self {
        Self::new(20)
    }
}

impl HashLifeEngine {
    /// `memory_cap_log2` - memo tables are dropped before a run once they hold
    /// more than `2^memory_cap_log2` nodes; clamped to
    /// `Config::MIN_MEMORY_CAP_LOG2..=Config::MAX_MEMORY_CAP_LOG2`.
    pub fn new(memory_cap_log2: u32) -> Self {
        Self {
            mem: MemoryManager::new(),
            rule: Rule::CONWAY,
            memory_cap_log2: memory_cap_log2
                .clamp(Config::MIN_MEMORY_CAP_LOG2, Config::MAX_MEMORY_CAP_LOG2),
            fallback: NaiveEngine::new(),
            runs: 0,
            generations_total: 0,
        }
    }

    pub fn memory_cap_log2(&self) -> u32 {
        self.memory_cap_log2
    }

    fn full_add(a: u16, b: u16, c: u16) -> (u16, u16) {
        let ab = a ^ b;
        (ab ^ c, (a & b) | (c & ab))
    }

    /// Next state of a row of 16 cells; the two edge cells are unreliable.
    fn update_row(rule: &Rule, row_prev: u16, row_curr: u16, row_next: u16) -> u16 {
        let [a, b, c] = [row_prev << 1, row_prev, row_prev >> 1];
        let [d, e] = [row_curr << 1, row_curr >> 1];
        let [f, g, h] = [row_next << 1, row_next, row_next >> 1];

        // bit-sliced neighbour count: cnt = b0 + 2*b1 + 4*b2 + 8*b3
        let (s0, c0) = Self::full_add(a, b, c);
        let (s1, c1) = Self::full_add(d, e, f);
        let (s2, c2) = (g ^ h, g & h);
        let (b0, k) = Self::full_add(s0, s1, s2);
        let (t, u) = Self::full_add(c0, c1, c2);
        let (b1, v) = (t ^ k, t & k);
        let (b2, b3) = (u ^ v, u & v);

        let (mut born, mut survive) = (0u16, 0u16);
        for n in 0..=8u16 {
            let bit = |x: u16, on: bool| if on { x } else { !x };
            let eq = bit(b0, n & 1 != 0)
                & bit(b1, n & 2 != 0)
                & bit(b2, n & 4 != 0)
                & bit(b3, n & 8 != 0);
            if rule.birth_mask() >> n & 1 != 0 {
                born |= eq;
            }
            if rule.survival_mask() >> n & 1 != 0 {
                survive |= eq;
            }
        }
        (row_curr & survive) | (!row_curr & born)
    }

    /// `nw`, `ne`, `sw`, `se` must be leaves; `steps <= LEAF_SIZE / 2`.
    ///
    /// Returns the central leaf after `steps` generations.
    fn update_leaves(
        &mut self,
        nw: NodeIdx,
        ne: NodeIdx,
        sw: NodeIdx,
        se: NodeIdx,
        steps: u64,
    ) -> NodeIdx {
        debug_assert!(steps <= LEAF_SIZE / 2);
        let [nw, ne, sw, se] =
            [nw, ne, sw, se].map(|x| self.mem.get(x, LEAF_SIZE_LOG2).leaf_rows());

        let mut src = [0u16; 16];
        for y in 0..8 {
            src[y] = u16::from_le_bytes([nw[y], ne[y]]);
            src[y + 8] = u16::from_le_bytes([sw[y], se[y]]);
        }
        let mut dst = [0u16; 16];

        for t in 1..=steps as usize {
            for y in t..16 - t {
                dst[y] = Self::update_row(&self.rule, src[y - 1], src[y], src[y + 1]);
            }
            std::mem::swap(&mut src, &mut dst);
        }

        let mut rows = [0u8; 8];
        for (dst, src) in rows.iter_mut().zip(&src[4..12]) {
            *dst = (src >> 4) as u8;
        }
        self.mem.find_leaf_from_rows(rows)
    }

    /// Central part of the square made of `nw`, `ne`, `sw`, `se`, without
    /// advancing it.
    ///
    /// `size_log2` is related to `nw`, `ne`, `sw`, `se` and return value
    fn center(
        &mut self,
        nw: NodeIdx,
        ne: NodeIdx,
        sw: NodeIdx,
        se: NodeIdx,
        size_log2: u32,
    ) -> NodeIdx {
        if size_log2 == LEAF_SIZE_LOG2 {
            let [nw, ne, sw, se] = [nw, ne, sw, se].map(|x| self.mem.get(x, size_log2).leaf_rows());
            let mut rows = [0u8; 8];
            for y in 0..4 {
                rows[y] = nw[y + 4] >> 4 | ne[y + 4] << 4;
                rows[y + 4] = sw[y] >> 4 | se[y] << 4;
            }
            return self.mem.find_leaf_from_rows(rows);
        }
        let [nw, ne, sw, se] = [nw, ne, sw, se].map(|x| self.mem.get(x, size_log2));
        self.mem.find_node(nw.se, ne.sw, sw.ne, se.nw, size_log2)
    }

    /// Advances the center by `2^steps_log2` generations, where
    /// `steps_log2 < size_log2 - 1`: the nine overlapping subsquares are only
    /// re-centered and the generations are spent in the second stage.
    ///
    /// `size_log2` is related to `nw`, `ne`, `sw`, `se` and return value
    fn update_nodes_single(
        &mut self,
        nw: NodeIdx,
        ne: NodeIdx,
        sw: NodeIdx,
        se: NodeIdx,
        size_log2: u32,
        steps_log2: u32,
    ) -> NodeIdx {
        let [nw_, ne_, sw_, se_] = [nw, ne, sw, se].map(|x| self.mem.get(x, size_log2));
        let s = size_log2 - 1;

        let t00 = self.center(nw_.nw, nw_.ne, nw_.sw, nw_.se, s);
        let t01 = self.center(nw_.ne, ne_.nw, nw_.se, ne_.sw, s);
        let t02 = self.center(ne_.nw, ne_.ne, ne_.sw, ne_.se, s);
        let t10 = self.center(nw_.sw, nw_.se, sw_.nw, sw_.ne, s);
        let t11 = self.center(nw_.se, ne_.sw, sw_.ne, se_.nw, s);
        let t12 = self.center(ne_.sw, ne_.se, se_.nw, se_.ne, s);
        let t20 = self.center(sw_.nw, sw_.ne, sw_.sw, sw_.se, s);
        let t21 = self.center(sw_.ne, se_.nw, sw_.se, se_.sw, s);
        let t22 = self.center(se_.nw, se_.ne, se_.sw, se_.se, s);

        let q00 = self.mem.find_node(t00, t01, t10, t11, size_log2);
        let q01 = self.mem.find_node(t01, t02, t11, t12, size_log2);
        let q10 = self.mem.find_node(t10, t11, t20, t21, size_log2);
        let q11 = self.mem.find_node(t11, t12, t21, t22, size_log2);

        let [s00, s01, s10, s11] =
            [q00, q01, q10, q11].map(|x| self.update_node(x, size_log2, steps_log2));

        self.mem.find_node(s00, s01, s10, s11, size_log2)
    }

    /// Advances the center by `2^steps_log2` generations, where
    /// `steps_log2 == size_log2 - 1`: both stages spend half of the generations.
    ///
    /// `size_log2` is related to `nw`, `ne`, `sw`, `se` and return value
    fn update_nodes_double(
        &mut self,
        nw: NodeIdx,
        ne: NodeIdx,
        sw: NodeIdx,
        se: NodeIdx,
        size_log2: u32,
        steps_log2: u32,
    ) -> NodeIdx {
        let [nw_, ne_, sw_, se_] = [nw, ne, sw, se].map(|x| self.mem.get(x, size_log2));
        let half = steps_log2 - 1;

        // First stage
        let p01 = self.mem.find_node(nw_.ne, ne_.nw, nw_.se, ne_.sw, size_log2);
        let p10 = self.mem.find_node(nw_.sw, nw_.se, sw_.nw, sw_.ne, size_log2);
        let p11 = self.mem.find_node(nw_.se, ne_.sw, sw_.ne, se_.nw, size_log2);
        let p12 = self.mem.find_node(ne_.sw, ne_.se, se_.nw, se_.ne, size_log2);
        let p21 = self.mem.find_node(sw_.ne, se_.nw, sw_.se, se_.sw, size_log2);

        let t00 = self.update_node(nw, size_log2, half);
        let t01 = self.update_node(p01, size_log2, half);
        let t02 = self.update_node(ne, size_log2, half);
        let t10 = self.update_node(p10, size_log2, half);
        let t11 = self.update_node(p11, size_log2, half);
        let t12 = self.update_node(p12, size_log2, half);
        let t20 = self.update_node(sw, size_log2, half);
        let t21 = self.update_node(p21, size_log2, half);
        let t22 = self.update_node(se, size_log2, half);

        // Second stage
        let pnw = self.mem.find_node(t00, t01, t10, t11, size_log2);
        let pne = self.mem.find_node(t01, t02, t11, t12, size_log2);
        let psw = self.mem.find_node(t10, t11, t20, t21, size_log2);
        let pse = self.mem.find_node(t11, t12, t21, t22, size_log2);
        let [r_nw, r_ne, r_sw, r_se] =
            [pnw, pne, psw, pse].map(|x| self.update_node(x, size_log2, half));
        self.mem.find_node(r_nw, r_ne, r_sw, r_se, size_log2)
    }

    /// Recursively updates nodes in graph.
    ///
    /// Returns the central half of `node` after `2^steps_log2` generations.
    ///
    /// `size_log2` is related to `node`; `steps_log2 <= size_log2 - 2`
    fn update_node(&mut self, node: NodeIdx, size_log2: u32, steps_log2: u32) -> NodeIdx {
        debug_assert!(size_log2 > LEAF_SIZE_LOG2 && steps_log2 + 2 <= size_log2);
        if node == NodeIdx::BLANK {
            return NodeIdx::BLANK;
        }
        if let Some(cache) = self.mem.cached_result(node, size_log2, steps_log2) {
            return cache;
        }

        let n = self.mem.get(node, size_log2);
        let cache = if size_log2 == LEAF_SIZE_LOG2 + 1 {
            self.update_leaves(n.nw, n.ne, n.sw, n.se, 1 << steps_log2)
        } else if steps_log2 + 2 == size_log2 {
            self.update_nodes_double(n.nw, n.ne, n.sw, n.se, size_log2 - 1, steps_log2)
        } else {
            self.update_nodes_single(n.nw, n.ne, n.sw, n.se, size_log2 - 1, steps_log2)
        };
        self.mem.store_result(node, size_log2, steps_log2, cache);
        cache
    }

    /// Builds the smallest quadtree holding `cells` (at least 32x32).
    /// Returns `None` if the pattern is too wide.
    fn build(&mut self, cells: &CellSet) -> Option<Field> {
        let bounds = cells.bounds()?;
        let extent = bounds.width().max(bounds.height());
        let size_log2 = extent
            .checked_next_power_of_two()
            .map_or(u128::BITS, u128::ilog2)
            .max(LEAF_SIZE_LOG2 + 2);
        if size_log2 > MAX_SIDE_LOG2 {
            return None;
        }

        let mut leaves: HashMap<(u64, u64), u64> = HashMap::new();
        for c in cells {
            let dx = c.x.abs_diff(bounds.min_x);
            let dy = c.y.abs_diff(bounds.min_y);
            *leaves
                .entry((dx >> LEAF_SIZE_LOG2, dy >> LEAF_SIZE_LOG2))
                .or_default() |= 1 << ((dy % LEAF_SIZE) * LEAF_SIZE + dx % LEAF_SIZE);
        }

        let mut level: HashMap<(u64, u64), NodeIdx> = leaves
            .into_iter()
            .map(|(pos, cells)| (pos, self.mem.find_leaf_from_u64(cells)))
            .collect();
        for child_log2 in LEAF_SIZE_LOG2..size_log2 {
            let mut parts: HashMap<(u64, u64), [NodeIdx; 4]> = HashMap::new();
            for ((x, y), idx) in level {
                let quadrant = ((y & 1) << 1 | (x & 1)) as usize;
                parts.entry((x >> 1, y >> 1)).or_default()[quadrant] = idx;
            }
            level = parts
                .into_iter()
                .map(|(pos, [nw, ne, sw, se])| {
                    (pos, self.mem.find_node(nw, ne, sw, se, child_log2 + 1))
                })
                .collect();
        }

        Some(Field {
            root: level.get(&(0, 0)).copied().unwrap_or(NodeIdx::BLANK),
            size_log2,
            x: bounds.min_x as i128,
            y: bounds.min_y as i128,
        })
    }

    /// Collects live cells of `idx` placed with its top-left corner at `(x, y)`.
    fn collect_cells(&self, idx: NodeIdx, size_log2: u32, x: i128, y: i128, dst: &mut CellSet) {
        if idx == NodeIdx::BLANK {
            return;
        }
        let n = self.mem.get(idx, size_log2);
        if size_log2 == LEAF_SIZE_LOG2 {
            let mut cells = n.leaf_cells();
            while cells != 0 {
                let i = cells.trailing_zeros() as i128;
                cells &= cells - 1;
                dst.insert(Cell::new((x + i % 8) as i64, (y + i / 8) as i64));
            }
            return;
        }
        let half = 1i128 << (size_log2 - 1);
        self.collect_cells(n.nw, size_log2 - 1, x, y, dst);
        self.collect_cells(n.ne, size_log2 - 1, x + half, y, dst);
        self.collect_cells(n.sw, size_log2 - 1, x, y + half, dst);
        self.collect_cells(n.se, size_log2 - 1, x + half, y + half, dst);
    }

    /// Add a blank frame around the field; the field becomes two times bigger.
    fn add_frame(&mut self, field: &mut Field) {
        let n = self.mem.get(field.root, field.size_log2);
        let b = NodeIdx::BLANK;
        let s = field.size_log2;
        let nw = self.mem.find_node(b, b, b, n.nw, s);
        let ne = self.mem.find_node(b, b, n.ne, b, s);
        let sw = self.mem.find_node(b, n.sw, b, b, s);
        let se = self.mem.find_node(n.se, b, b, b, s);
        field.root = self.mem.find_node(nw, ne, sw, se, s + 1);
        field.x -= 1 << (s - 1);
        field.y -= 1 << (s - 1);
        field.size_log2 += 1;
    }

    /// Remove a blank frame around the field, making it two times smaller.
    fn pop_frame(&mut self, field: &mut Field) {
        let n = self.mem.get(field.root, field.size_log2);
        field.root = self.center(n.nw, n.ne, n.sw, n.se, field.size_log2 - 1);
        field.x += 1 << (field.size_log2 - 2);
        field.y += 1 << (field.size_log2 - 2);
        field.size_log2 -= 1;
    }

    /// Whether every live cell lies in the central square of side `2^(size_log2 - depth)`.
    fn fits_in_center(&mut self, field: &Field, depth: u32) -> bool {
        let population = self.mem.get(field.root, field.size_log2).population;
        let (mut idx, mut size_log2) = (field.root, field.size_log2);
        for _ in 0..depth {
            let n = self.mem.get(idx, size_log2);
            idx = self.center(n.nw, n.ne, n.sw, n.se, size_log2 - 1);
            size_log2 -= 1;
        }
        self.mem.get(idx, size_log2).population == population
    }

    /// Advances the field by `2^steps_log2` generations.
    ///
    /// Returns `false` if the field would have to outgrow `MAX_SIDE_LOG2`.
    /// Steps a pattern too wide for the quadtree one generation at a time,
    /// at most `FALLBACK_GENERATIONS` of them.
    fn step_fallback(&mut self, cells: &CellSet, generations: u64, rule: &Rule) -> Advance {
        let generations = generations.min(FALLBACK_GENERATIONS);
        let mut curr = cells.clone();
        for _ in 0..generations {
            curr = self.fallback.update(&curr, rule);
        }
        debug!(generations, population = curr.len(), "stepped wide pattern cell by cell");
        Advance {
            cells: curr,
            generations,
        }
    }

    fn advance_pow2(&mut self, field: &mut Field, steps_log2: u32) -> bool {
        if field.root == NodeIdx::BLANK {
            return true;
        }
        // the pattern must sit in the central quarter, so that growth during
        // 2^steps_log2 generations stays inside the returned central half
        while field.size_log2 < steps_log2 + 3 || !self.fits_in_center(field, 2) {
            if field.size_log2 >= MAX_SIDE_LOG2 {
                return false;
            }
            self.add_frame(field);
        }

        field.root = self.update_node(field.root, field.size_log2, steps_log2);
        field.x += 1 << (field.size_log2 - 2);
        field.y += 1 << (field.size_log2 - 2);
        field.size_log2 -= 1;

        while field.size_log2 > LEAF_SIZE_LOG2 + 2 && self.fits_in_center(field, 1) {
            self.pop_frame(field);
        }
        true
    }
}

impl EngineAdapter for HashLifeEngine {
    fn run(&mut self, cells: &CellSet, generations: u64, rule: &Rule) -> Result<Advance> {
        if generations == 0 {
            return Err(Error::InvalidGenerations(generations));
        }
        if *rule != self.rule {
            debug!(old = %self.rule, new = %rule, "rule changed, dropping hashlife memo");
            self.mem.clear();
            self.rule = *rule;
        }
        if self.mem.len() > 1 << self.memory_cap_log2 {
            debug!(nodes = self.mem.len(), "hashlife memory over cap, clearing");
            self.mem.clear();
        }
        self.runs += 1;

        if cells.is_empty() {
            return Ok(Advance {
                cells: CellSet::new(),
                generations,
            });
        }
        let Some(mut field) = self.build(cells) else {
            debug!("pattern too wide for hashlife");
            let res = self.step_fallback(cells, generations, rule);
            self.generations_total += res.generations as u128;
            return Ok(res);
        };

        // smallest steps first, so a size limit cuts off as little as possible
        let mut advanced = 0;
        for steps_log2 in 0..u64::BITS {
            if self.mem.is_exhausted() {
                break;
            }
            if generations >> steps_log2 & 1 == 0 {
                continue;
            }
            if !self.advance_pow2(&mut field, steps_log2) {
                debug!(advanced, generations, "hashlife reached its size limit");
                break;
            }
            advanced += 1 << steps_log2;
        }
        if self.mem.is_exhausted() {
            debug!(nodes = self.mem.len(), "hashlife ran out of node indices, clearing");
            self.mem.clear();
            let res = self.step_fallback(cells, generations, rule);
            self.generations_total += res.generations as u128;
            return Ok(res);
        }

        let mut result = CellSet::with_capacity(cells.len());
        self.collect_cells(field.root, field.size_log2, field.x, field.y, &mut result);
        if advanced < generations {
            let rest = self.step_fallback(&result, generations - advanced, rule);
            result = rest.cells;
            advanced += rest.generations;
        }
        self.generations_total += advanced as u128;
        debug!(
            generations = advanced,
            population = result.len(),
            nodes = self.mem.len(),
            "hashlife engine advanced"
        );
        Ok(Advance {
            cells: result,
            generations: advanced,
        })
    }

    fn clear_cache(&mut self) {
        self.mem.clear();
        self.fallback.clear_cache();
    }

    fn bytes_total(&self) -> usize {
        self.mem.bytes_total() + self.fallback.bytes_total()
    }

    fn statistics(&self) -> String {
        let mut s = "Engine: Hashlife\n".to_string();
        s += &format!("Rule: {}\n", self.rule);
        s += &format!("Runs: {}, generations: {}\n", self.runs, self.generations_total);
        s += &self.mem.stats_fast();
        s
    }
}
