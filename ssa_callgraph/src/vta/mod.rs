//! Variable-type analysis.
//!
//! VTA builds a type-propagation graph mirroring how values flow through
//! the chosen functions, solves it for the set of concrete types (and
//! function values) reaching each abstract location, and resolves dynamic
//! calls from the solved receiver sets. Resolution can add new flow edges
//! (arguments into parameters, results back out), so solving and
//! resolution alternate until both the propagation graph and the call
//! graph stabilize; everything grows monotonically over finite sets, so
//! the loop terminates.
//!
//! The analysis accepts an arbitrary function subset. When an initial call
//! graph is supplied (e.g. CHA output), only functions present in it are
//! considered as dynamic-call candidates. Functions without bodies get
//! parameter and result locations connected to nothing; missing
//! implementations yield an underapproximation, never a failure.

mod graph;
mod propagation;

use indexmap::IndexSet;
use ssa_ir::{FuncId, Program};

use crate::cancel::{self, CancelToken};
use crate::diagnostics::{self, Event};
use crate::error::Result;
use crate::graph::CallGraph;

use graph::{DynSite, Flow, TpgBuilder, TpgNode, TypePropGraph};
use propagation::propagate;

/// Analyze `funcs` and produce a call graph. `initial`, when given,
/// restricts dynamic-call candidates to functions it contains.
pub fn call_graph(
    prog: &Program,
    funcs: &IndexSet<FuncId>,
    initial: Option<&CallGraph>,
    cancel: Option<&CancelToken>,
) -> Result<CallGraph> {
    let mut cg = CallGraph::new(prog);
    let mut builder = TpgBuilder::new(prog, funcs);
    builder.build(&mut cg)?;
    let (mut graph, mut dyn_sites) = builder.into_parts();

    loop {
        cancel::check(cancel)?;
        propagate(&mut graph);

        let mut changed = false;
        for site in &mut dyn_sites {
            let candidates = resolve_site(prog, &graph, site, initial);
            if candidates.is_empty() && site.resolved.is_empty() {
                diagnostics::emit(Event::EmptyCandidateSet {
                    site: site.site,
                    method: site.invoke.as_ref().map(|(_, m)| m.clone()),
                });
            }
            for callee in candidates {
                if !site.resolved.insert(callee) {
                    continue;
                }
                changed = true;
                cg.add_call_edge(site.caller, callee, Some(site.site))?;
                wire_dynamic(prog, funcs, &mut graph, site, callee);
            }
        }
        if !changed {
            break;
        }
    }
    Ok(cg)
}

/// Convenience form over every function in the program.
pub fn call_graph_all(
    prog: &Program,
    initial: Option<&CallGraph>,
    cancel: Option<&CancelToken>,
) -> Result<CallGraph> {
    let funcs: IndexSet<FuncId> = prog.all_functions().collect();
    call_graph(prog, &funcs, initial, cancel)
}

/// Candidate callees for a dynamic site under the current solution, in
/// flow-set order.
fn resolve_site(
    prog: &Program,
    graph: &TypePropGraph,
    site: &DynSite,
    initial: Option<&CallGraph>,
) -> Vec<FuncId> {
    let allowed =
        |f: FuncId| initial.is_none() || initial.is_some_and(|g| g.node_for(f).is_some());
    let set = &graph.types[site.recv as usize];
    let mut out = Vec::new();
    match &site.invoke {
        Some((iface, method)) => {
            for flow in set {
                if let Flow::Type(t) = flow {
                    if prog.implements(*t, *iface) {
                        if let Some(f) = prog.lookup_method(*t, method) {
                            if allowed(f) && !out.contains(&f) {
                                out.push(f);
                            }
                        }
                    }
                }
            }
        }
        None => {
            for flow in set {
                if let Flow::Func(f) = flow {
                    if allowed(*f) && !out.contains(f) {
                        out.push(*f);
                    }
                }
            }
        }
    }
    out
}

/// Wire a freshly resolved callee: receiver and arguments into its
/// parameter slots, result slots back into the call result.
fn wire_dynamic(
    prog: &Program,
    funcs: &IndexSet<FuncId>,
    graph: &mut TypePropGraph,
    site: &DynSite,
    callee: FuncId,
) {
    if !funcs.contains(&callee) {
        return;
    }
    let invoke = site.invoke.is_some();
    if invoke {
        // Parameter 0 of a method is its receiver.
        let slot = graph.node(TpgNode::Param {
            func: callee,
            index: 0,
        });
        graph.add_edge(site.recv, slot);
    }
    let shift = u32::from(invoke);
    for (i, arg) in site.args.iter().enumerate() {
        if let Some(a) = arg {
            let slot = graph.node(TpgNode::Param {
                func: callee,
                index: i as u32 + shift,
            });
            graph.add_edge(*a, slot);
        }
    }
    TpgBuilder::wire_results_for(graph, prog, site.result, callee);
}
