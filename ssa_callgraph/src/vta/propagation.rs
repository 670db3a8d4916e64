//! Fixpoint propagation over the type-propagation graph.
//!
//! The graph is condensed into strongly connected components (iterative
//! Tarjan, so pathological chains cannot overflow the stack) and the flow
//! sets are pushed through the condensation from sources to sinks. Every
//! node of a component ends up with the component's full set; saturation
//! inside a component is sound because the flow universe is finite.

use indexmap::IndexSet;

use super::graph::{Flow, TypePropGraph};

/// Strongly connected components in Tarjan emission order (sinks first).
fn tarjan(succs: &[IndexSet<u32>]) -> Vec<Vec<u32>> {
    let n = succs.len();
    const UNSET: u32 = u32::MAX;
    let mut index = vec![UNSET; n];
    let mut low = vec![0u32; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<u32> = Vec::new();
    let mut next = 0u32;
    let mut comps: Vec<Vec<u32>> = Vec::new();

    for start in 0..n as u32 {
        if index[start as usize] != UNSET {
            continue;
        }
        let mut frames: Vec<(u32, usize)> = vec![(start, 0)];
        while let Some(&(v, child)) = frames.last() {
            let vu = v as usize;
            if child == 0 && index[vu] == UNSET {
                index[vu] = next;
                low[vu] = next;
                next += 1;
                stack.push(v);
                on_stack[vu] = true;
            }
            if child < succs[vu].len() {
                let w = *succs[vu]
                    .get_index(child)
                    .expect("child index in bounds");
                frames.last_mut().expect("frames non-empty").1 = child + 1;
                let wu = w as usize;
                if index[wu] == UNSET {
                    frames.push((w, 0));
                } else if on_stack[wu] {
                    low[vu] = low[vu].min(index[wu]);
                }
            } else {
                frames.pop();
                if let Some(&(p, _)) = frames.last() {
                    let pu = p as usize;
                    low[pu] = low[pu].min(low[vu]);
                }
                if low[vu] == index[vu] {
                    let mut comp = Vec::new();
                    loop {
                        let w = stack.pop().expect("scc stack non-empty");
                        on_stack[w as usize] = false;
                        comp.push(w);
                        if w == v {
                            break;
                        }
                    }
                    comps.push(comp);
                }
            }
        }
    }
    comps
}

/// Solve the least fixed point: every node's set becomes the union of its
/// own seeds and everything flowing in. Monotone and idempotent.
pub(crate) fn propagate(g: &mut TypePropGraph) {
    let comps = tarjan(&g.succs);
    let mut comp_of = vec![0usize; g.len()];
    for (ci, comp) in comps.iter().enumerate() {
        for &v in comp {
            comp_of[v as usize] = ci;
        }
    }

    // Emission order is sinks-first, so the reverse walks sources-first:
    // by the time a component is processed, every upstream contribution
    // has already been pushed into its members' sets.
    for comp in comps.iter().rev() {
        let mut set: IndexSet<Flow> = IndexSet::new();
        for &v in comp {
            set.extend(g.types[v as usize].iter().copied());
        }
        for &v in comp {
            g.types[v as usize] = set.clone();
        }
        for &v in comp {
            let outs: Vec<u32> = g.succs[v as usize].iter().copied().collect();
            for w in outs {
                if comp_of[w as usize] != comp_of[v as usize] {
                    g.types[w as usize].extend(set.iter().copied());
                }
            }
        }
    }
}
