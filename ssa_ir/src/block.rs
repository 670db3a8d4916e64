//! Basic blocks of the control-flow graph.

use serde::{Deserialize, Serialize};

use crate::ids::{BlockId, FuncId, InstrId};

/// A basic block. The final instruction of a non-empty block is always a
/// terminator (Jump, If, Return or Panic); the builder enforces this and
/// that at most one CFG edge exists between any pair of blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Index of this block within its parent function.
    pub index: u32,
    pub func: FuncId,
    pub instrs: Vec<InstrId>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
    /// Immediate dominator; None for the entry block.
    #[serde(default)]
    pub idom: Option<BlockId>,
}
