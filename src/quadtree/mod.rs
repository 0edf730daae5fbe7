mod hashlife;
mod memory;
mod node;

const LEAF_SIZE: u64 = 8;
const LEAF_SIZE_LOG2: u32 = LEAF_SIZE.ilog2();

use memory::MemoryManager;
use node::{NodeIdx, QuadTreeNode};

pub use hashlife::HashLifeEngine;
