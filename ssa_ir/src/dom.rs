//! Dominator-tree computation.
//!
//! Iterative algorithm over the reverse postorder (Cooper/Harvey/Kennedy).
//! Runs once per defined function when the program is frozen; the result is
//! stored as each block's immediate dominator.

use std::collections::HashMap;

use crate::ids::{BlockId, FuncId};
use crate::program::Program;

/// Compute immediate dominators for every block of `func` and record them
/// on the blocks. The entry block gets no immediate dominator.
pub(crate) fn compute_dominators(prog: &mut Program, func: FuncId) {
    let blocks = prog.func(func).blocks.clone();
    if blocks.is_empty() {
        return;
    }
    let entry = blocks[0];

    // Depth-first postorder over successors.
    let mut postorder: Vec<BlockId> = Vec::with_capacity(blocks.len());
    let mut seen: std::collections::HashSet<BlockId> = std::collections::HashSet::new();
    let mut stack: Vec<(BlockId, usize)> = vec![(entry, 0)];
    seen.insert(entry);
    loop {
        let Some(&(b, i)) = stack.last() else { break };
        let succs = &prog.block(b).succs;
        if i < succs.len() {
            let s = succs[i];
            stack.last_mut().expect("stack non-empty").1 = i + 1;
            if seen.insert(s) {
                stack.push((s, 0));
            }
        } else {
            postorder.push(b);
            stack.pop();
        }
    }

    let mut ponum: HashMap<BlockId, usize> = HashMap::new();
    for (i, b) in postorder.iter().enumerate() {
        ponum.insert(*b, i);
    }
    let rpo: Vec<BlockId> = postorder.iter().rev().copied().collect();

    let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
    idom.insert(entry, entry);

    let intersect = |idom: &HashMap<BlockId, BlockId>,
                     ponum: &HashMap<BlockId, usize>,
                     mut a: BlockId,
                     mut b: BlockId| {
        while a != b {
            while ponum[&a] < ponum[&b] {
                a = idom[&a];
            }
            while ponum[&b] < ponum[&a] {
                b = idom[&b];
            }
        }
        a
    };

    let mut changed = true;
    while changed {
        changed = false;
        for &b in &rpo {
            if b == entry {
                continue;
            }
            let preds = prog.block(b).preds.clone();
            let mut new_idom: Option<BlockId> = None;
            for p in preds {
                // Unreachable predecessors have no postorder number.
                if !ponum.contains_key(&p) || !idom.contains_key(&p) {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(cur) => intersect(&idom, &ponum, cur, p),
                });
            }
            if let Some(n) = new_idom {
                if idom.get(&b) != Some(&n) {
                    idom.insert(b, n);
                    changed = true;
                }
            }
        }
    }

    for b in blocks {
        let d = if b == entry { None } else { idom.get(&b).copied() };
        prog.block_mut(b).idom = d;
    }
}

/// Does block `a` dominate block `b` (reflexively) within one function?
pub fn dominates(prog: &Program, a: BlockId, b: BlockId) -> bool {
    let mut cur = Some(b);
    while let Some(c) = cur {
        if c == a {
            return true;
        }
        cur = prog.block(c).idom;
    }
    false
}
