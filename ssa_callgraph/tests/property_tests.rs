//! Universal properties: determinism, precision monotonicity, edge
//! uniqueness, deletion idempotence, the digraph round trip, and
//! cancellation safety across all analyzers.

mod common;

use std::collections::BTreeSet;

use common::{bound_method_program, higher_order_program, iface_program};
use pretty_assertions::assert_eq;
use ssa_callgraph::{cha, rta, statics, vta, write_graph, CallGraph, CancelToken, Error};
use ssa_ir::{FuncId, InstrId, Program};

/// (caller, callee) name pairs of all site-tagged edges (root edges have
/// no site and are not part of the precision comparisons).
fn site_edge_pairs(cg: &CallGraph, prog: &Program) -> BTreeSet<(String, String)> {
    let name = |n| match cg.node(n).func {
        Some(f) => prog.qualified_name(f),
        None => "<root>".to_string(),
    };
    cg.edges()
        .filter(|(_, e)| e.site.is_some())
        .map(|(_, e)| (name(e.caller), name(e.callee)))
        .collect()
}

/// Functions reachable in a graph from the given entry functions.
fn reachable_from(cg: &CallGraph, roots: &[FuncId]) -> BTreeSet<FuncId> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<_> = roots
        .iter()
        .filter_map(|f| cg.node_for(*f).map(|n| (n, *f)))
        .collect();
    for (_, f) in &stack {
        seen.insert(*f);
    }
    while let Some((n, _)) = stack.pop() {
        for &e in cg.node(n).out_edges() {
            let edge = cg.edge(e);
            if let Some(f) = cg.node(edge.callee).func {
                if seen.insert(f) {
                    stack.push((edge.callee, f));
                }
            }
        }
    }
    seen
}

#[test]
fn test_determinism_of_edges_and_visit_order() {
    let run = || {
        let p = iface_program(false);
        let res = rta::analyze(&p.prog, &[p.m1_main, p.m2_main], None).unwrap();
        let mut visited: Vec<(Option<FuncId>, Option<FuncId>, Option<InstrId>)> = Vec::new();
        res.call_graph
            .visit_edges(&p.prog, |_, e| {
                visited.push((
                    res.call_graph.node(e.caller).func,
                    res.call_graph.node(e.callee).func,
                    e.site,
                ));
                Ok::<(), ()>(())
            })
            .unwrap();
        let mut out = Vec::new();
        write_graph(&p.prog, &res.call_graph, "digraph", &mut out).unwrap();
        (visited, out)
    };
    assert_eq!(run(), run());
}

#[test]
fn test_precision_monotonicity_higher_order() {
    let p = higher_order_program();
    let st = site_edge_pairs(&statics::call_graph(&p.prog, None).unwrap(), &p.prog);
    let vt = site_edge_pairs(&vta::call_graph_all(&p.prog, None, None).unwrap(), &p.prog);
    let ch = site_edge_pairs(&cha::call_graph(&p.prog, None).unwrap(), &p.prog);

    assert!(st.is_subset(&vt), "static ⊄ vta: {:?} vs {:?}", st, vt);
    assert!(vt.is_subset(&ch), "vta ⊄ cha: {:?} vs {:?}", vt, ch);
}

#[test]
fn test_precision_monotonicity_interfaces() {
    let p = iface_program(false);
    let st = site_edge_pairs(&statics::call_graph(&p.prog, None).unwrap(), &p.prog);
    let vt = site_edge_pairs(&vta::call_graph_all(&p.prog, None, None).unwrap(), &p.prog);
    let ch = site_edge_pairs(&cha::call_graph(&p.prog, None).unwrap(), &p.prog);
    let rt = site_edge_pairs(
        &rta::analyze(&p.prog, &[p.m1_main, p.m2_main], None)
            .unwrap()
            .call_graph,
        &p.prog,
    );

    assert!(st.is_subset(&vt));
    assert!(vt.is_subset(&ch));
    assert!(rt.is_subset(&ch), "rta ⊄ cha: {:?} vs {:?}", rt, ch);
}

#[test]
fn test_rta_reachability_is_subset_of_cha_reachability() {
    let p = iface_program(false);
    let roots = [p.m1_main, p.m2_main];
    let res = rta::analyze(&p.prog, &roots, None).unwrap();
    let cha_graph = cha::call_graph(&p.prog, None).unwrap();
    let cha_reachable = reachable_from(&cha_graph, &roots);

    for f in &res.reachable {
        assert!(
            cha_reachable.contains(f),
            "{} reachable under rta but not cha",
            p.prog.qualified_name(*f)
        );
    }
}

#[test]
fn test_edge_uniqueness() {
    let p = iface_program(false);
    let res = rta::analyze(&p.prog, &[p.m1_main, p.m2_main], None).unwrap();
    let mut triples = BTreeSet::new();
    for (_, e) in res.call_graph.edges() {
        assert!(
            triples.insert((e.caller, e.callee, e.site)),
            "duplicate edge {:?} -> {:?} at {:?}",
            e.caller,
            e.callee,
            e.site
        );
    }
}

#[test]
fn test_synthetic_deletion_is_idempotent() {
    let p = bound_method_program();
    let mut once = statics::call_graph(&p.prog, None).unwrap();
    once.delete_synthetic_nodes(&p.prog);
    let after_once = common::sorted_edges(&once, &p.prog);
    let nodes_once = once.node_count();

    once.delete_synthetic_nodes(&p.prog);
    assert_eq!(common::sorted_edges(&once, &p.prog), after_once);
    assert_eq!(once.node_count(), nodes_once);
}

#[test]
fn test_digraph_round_trip() {
    let p = iface_program(false);
    let res = rta::analyze(&p.prog, &[p.m1_main, p.m2_main], None).unwrap();
    let cg = &res.call_graph;

    let mut out = Vec::new();
    write_graph(&p.prog, cg, "digraph", &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let mut count = 0;
    for line in text.lines() {
        count += 1;
        // Each record is two quoted identifiers.
        let mut parts = line.splitn(2, "\" \"");
        let caller = parts
            .next()
            .and_then(|s| s.strip_prefix('"'))
            .expect("quoted caller");
        let callee = parts
            .next()
            .and_then(|s| s.strip_suffix('"'))
            .expect("quoted callee");

        // Re-parsing the line and looking the nodes back up recovers an
        // edge of the graph (up to site identity).
        let find = |name: &str| {
            cg.nodes().find(|(_, n)| match n.func {
                Some(f) => p.prog.qualified_name(f) == name,
                None => name == "<root>",
            })
        };
        let (c, _) = find(caller).expect("caller node exists");
        let (d, _) = find(callee).expect("callee node exists");
        assert!(
            cg.edges().any(|(_, e)| e.caller == c && e.callee == d),
            "no edge {} -> {}",
            caller,
            callee
        );
    }
    assert_eq!(count, cg.edge_count());
}

#[test]
fn test_all_analyzers_honor_cancellation() {
    let p = iface_program(false);
    let token = CancelToken::new();
    token.cancel();

    assert!(matches!(
        statics::call_graph(&p.prog, Some(&token)),
        Err(Error::Cancelled)
    ));
    assert!(matches!(
        cha::call_graph(&p.prog, Some(&token)),
        Err(Error::Cancelled)
    ));
    assert!(matches!(
        rta::analyze(&p.prog, &[p.m1_main], Some(&token)),
        Err(Error::Cancelled)
    ));
    assert!(matches!(
        vta::call_graph_all(&p.prog, None, Some(&token)).map(|_| ()),
        Err(Error::Cancelled)
    ));
}
