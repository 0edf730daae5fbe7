use super::{NodeIdx, QuadTreeNode, LEAF_SIZE_LOG2};
use crate::NiceInt;
use ahash::AHashMap as HashMap;

/// Nodes of one size: hash-consing table plus memoized updates.
struct Layer {
    // all allocated nodes; NodeIdx(0) is the blank node
    storage: Vec<QuadTreeNode>,
    // children -> node
    index: HashMap<[NodeIdx; 4], NodeIdx>,
    // (node, steps_log2) -> center of the node after 2^steps_log2 generations
    results: HashMap<(NodeIdx, u32), NodeIdx>,
    // how many times elements were found
    hits: u64,
    // how many times elements were inserted
    misses: u64,
}

impl Layer {
    fn new() -> Self {
        Self {
            storage: vec![QuadTreeNode::default()],
            index: HashMap::new(),
            results: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// `None` once the layer holds `capacity` nodes and `node` is new.
    fn find(&mut self, node: QuadTreeNode, capacity: usize) -> Option<NodeIdx> {
        let key = node.children();
        if let Some(&idx) = self.index.get(&key) {
            self.hits += 1;
            return Some(idx);
        }
        if self.storage.len() >= capacity {
            return None;
        }
        self.misses += 1;
        let idx = NodeIdx(u32::try_from(self.storage.len()).ok()?);
        self.storage.push(node);
        self.index.insert(key, idx);
        Some(idx)
    }

    fn bytes_total(&self) -> usize {
        self.storage.capacity() * std::mem::size_of::<QuadTreeNode>()
            + self.index.capacity() * std::mem::size_of::<([NodeIdx; 4], NodeIdx)>()
            + self.results.capacity() * std::mem::size_of::<((NodeIdx, u32), NodeIdx)>()
    }
}

/// Storage of quadtree nodes, one layer per side length starting from leaves.
///
/// A layer that runs out of node indices makes every new node blank and
/// marks the memory as exhausted; results computed since are garbage until
/// [`MemoryManager::clear`].
pub struct MemoryManager {
    layers: Vec<Layer>,
    // nodes per layer, the blank one included
    layer_capacity: usize,
    exhausted: bool,
}

impl MemoryManager {
    /// Create a new memory manager.
    pub fn new() -> Self {
        Self::with_layer_capacity(u32::MAX as usize)
    }

    pub fn with_layer_capacity(layer_capacity: usize) -> Self {
        Self {
            layers: vec![Layer::new()],
            layer_capacity: layer_capacity.clamp(1, u32::MAX as usize),
            exhausted: false,
        }
    }

    /// `true` if some node could not be stored since the last clear.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn find(&mut self, node: QuadTreeNode, size_log2: u32) -> NodeIdx {
        let capacity = self.layer_capacity;
        match self.layer_mut(size_log2).find(node, capacity) {
            Some(idx) => idx,
            None => {
                self.exhausted = true;
                NodeIdx::BLANK
            }
        }
    }

    fn layer(&self, size_log2: u32) -> &Layer {
        &self.layers[(size_log2 - LEAF_SIZE_LOG2) as usize]
    }

    fn layer_mut(&mut self, size_log2: u32) -> &mut Layer {
        let i = (size_log2 - LEAF_SIZE_LOG2) as usize;
        if self.layers.len() <= i {
            self.layers.resize_with(i + 1, Layer::new);
        }
        &mut self.layers[i]
    }

    /// Get the node with the given index.
    #[inline]
    pub fn get(&self, idx: NodeIdx, size_log2: u32) -> QuadTreeNode {
        if idx == NodeIdx::BLANK {
            return QuadTreeNode::default();
        }
        self.layer(size_log2).storage[idx.0 as usize]
    }

    /// Find a leaf node with the given cells.
    /// If the node is not found, it is created.
    ///
    /// `cells` is an array of 8 bytes, where each byte represents a row of 8 cells.
    pub fn find_leaf_from_rows(&mut self, rows: [u8; 8]) -> NodeIdx {
        self.find_leaf_from_u64(u64::from_le_bytes(rows))
    }

    /// Find a leaf node with the given cells.
    /// If the node is not found, it is created.
    pub fn find_leaf_from_u64(&mut self, cells: u64) -> NodeIdx {
        if cells == 0 {
            return NodeIdx::BLANK;
        }
        self.find(QuadTreeNode::leaf(cells), LEAF_SIZE_LOG2)
    }

    /// Find a node with the given parts.
    ///
    /// `size_log2` is related to the result! `nw`, `ne`, `sw`, `se` are `size_log2 - 1`
    ///
    /// If the node is not found, it is created.
    pub fn find_node(
        &mut self,
        nw: NodeIdx,
        ne: NodeIdx,
        sw: NodeIdx,
        se: NodeIdx,
        size_log2: u32,
    ) -> NodeIdx {
        if [nw, ne, sw, se] == [NodeIdx::BLANK; 4] {
            return NodeIdx::BLANK;
        }
        let population = [nw, ne, sw, se]
            .iter()
            .map(|&x| self.get(x, size_log2 - 1).population)
            .sum();
        self.find(
            QuadTreeNode {
                nw,
                ne,
                sw,
                se,
                population,
            },
            size_log2,
        )
    }

    pub fn cached_result(&self, idx: NodeIdx, size_log2: u32, steps_log2: u32) -> Option<NodeIdx> {
        self.layer(size_log2).results.get(&(idx, steps_log2)).copied()
    }

    pub fn store_result(&mut self, idx: NodeIdx, size_log2: u32, steps_log2: u32, result: NodeIdx) {
        self.layer_mut(size_log2)
            .results
            .insert((idx, steps_log2), result);
    }

    /// Drops every node and memoized result.
    pub fn clear(&mut self) {
        self.layers = vec![Layer::new()];
        self.exhausted = false;
    }

    /// Number of stored nodes across all layers.
    pub fn len(&self) -> usize {
        self.layers.iter().map(|m| m.storage.len() - 1).sum()
    }

    pub fn bytes_total(&self) -> usize {
        self.layers.iter().map(Layer::bytes_total).sum()
    }

    /// Get statistics about the memory manager.
    pub fn stats_fast(&self) -> String {
        let mut s = String::new();

        s += &format!(
            "memory consumption: {} KB\n",
            NiceInt::from_usize(self.bytes_total() >> 10),
        );

        let total_misses = self.layers.iter().map(|m| m.misses).sum::<u64>();
        let total_hits = self.layers.iter().map(|m| m.hits).sum::<u64>();
        s += &format!(
            "hashtable misses / hits: {} / {}\n",
            NiceInt::from(total_misses),
            NiceInt::from(total_hits),
        );

        let results = self.layers.iter().map(|m| m.results.len()).sum::<usize>();
        s += &format!("memoized updates: {}\n", NiceInt::from_usize(results));

        let nodes_total = self.len().max(1);
        s += "Nodes' sizes (side lengths) distribution:\n";
        s += &format!("total - {}\n", NiceInt::from_usize(self.len()));
        for (i, m) in self.layers.iter().enumerate() {
            let percent = (m.storage.len() - 1) * 100 / nodes_total;
            if percent == 0 {
                continue;
            }
            s += &format!("2^{:<2} -{:>3}%\n", LEAF_SIZE_LOG2 + i as u32, percent);
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_are_hash_consed() {
        let mut mem = MemoryManager::new();
        let a = mem.find_leaf_from_u64(0b111);
        let b = mem.find_leaf_from_u64(0b111);
        assert_eq!(a, b);
        assert_eq!(mem.find_leaf_from_u64(0), NodeIdx::BLANK);

        let n1 = mem.find_node(a, NodeIdx::BLANK, NodeIdx::BLANK, a, LEAF_SIZE_LOG2 + 1);
        let n2 = mem.find_node(a, NodeIdx::BLANK, NodeIdx::BLANK, a, LEAF_SIZE_LOG2 + 1);
        assert_eq!(n1, n2);
        assert_eq!(mem.get(n1, LEAF_SIZE_LOG2 + 1).population, 6);
        assert_eq!(mem.len(), 2);

        mem.clear();
        assert_eq!(mem.len(), 0);
    }

    #[test]
    fn full_layer_is_reported() {
        let mut mem = MemoryManager::with_layer_capacity(3);
        let a = mem.find_leaf_from_u64(1);
        let b = mem.find_leaf_from_u64(2);
        assert!(!mem.is_exhausted());
        assert_eq!(mem.find_leaf_from_u64(3), NodeIdx::BLANK);
        assert!(mem.is_exhausted());
        assert_eq!(mem.find_leaf_from_u64(1), a);
        assert_eq!(mem.find_leaf_from_u64(2), b);
        assert_eq!(mem.len(), 2);

        mem.clear();
        assert!(!mem.is_exhausted());
        assert_ne!(mem.find_leaf_from_u64(3), NodeIdx::BLANK);
    }
}
