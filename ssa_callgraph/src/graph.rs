//! The call graph: a directed multigraph of function nodes and call-site
//! edges, populated by exactly one analyzer and then frozen.
//!
//! Edges are deduplicated on (caller, callee, site): inserting a duplicate
//! returns the existing edge. Nodes and edges carry stable local ids;
//! adjacency lists preserve insertion order, which fixes the edge
//! visitation order.

use std::collections::HashMap;

use indexmap::IndexMap;
use ssa_ir::{FuncId, InstrId, Program};

use crate::diagnostics::{self, Event};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub u32);

/// A node wraps exactly one function; the root node wraps none.
#[derive(Debug, Clone)]
pub struct Node {
    pub func: Option<FuncId>,
    in_edges: Vec<EdgeId>,
    out_edges: Vec<EdgeId>,
    deleted: bool,
}

impl Node {
    pub fn in_edges(&self) -> &[EdgeId] {
        &self.in_edges
    }

    pub fn out_edges(&self) -> &[EdgeId] {
        &self.out_edges
    }
}

/// An edge: caller, callee and the call-site instruction. Root edges have
/// no site.
#[derive(Debug, Clone)]
pub struct Edge {
    pub caller: NodeId,
    pub callee: NodeId,
    pub site: Option<InstrId>,
    deleted: bool,
}

impl Edge {
    /// Is this edge dynamic, i.e. does its site fail to resolve its callee
    /// statically? Root edges count as static.
    pub fn is_dynamic(&self, prog: &Program) -> bool {
        match self.site {
            Some(site) => prog
                .instr(site)
                .call_common()
                .is_some_and(|c| c.static_callee(prog).is_none()),
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct CallGraph {
    root: Option<NodeId>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    func_to_node: IndexMap<FuncId, NodeId>,
    edge_index: HashMap<(NodeId, NodeId, Option<InstrId>), EdgeId>,
    /// Function-id bound of the analyzed program, for add-edge validation.
    func_count: u32,
}

impl CallGraph {
    pub fn new(prog: &Program) -> Self {
        Self {
            root: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            func_to_node: IndexMap::new(),
            edge_index: HashMap::new(),
            func_count: prog.func_count() as u32,
        }
    }

    /// A graph with a root node whose out-edges mark `roots` as externally
    /// called entry points.
    pub fn with_root(prog: &Program, roots: &[FuncId]) -> Result<Self> {
        let mut g = Self::new(prog);
        let root = NodeId(0);
        g.nodes.push(Node {
            func: None,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
            deleted: false,
        });
        g.root = Some(root);
        for &f in roots {
            let n = g.create_node(f)?;
            g.add_edge(root, n, None);
        }
        Ok(g)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The node for `func`, creating it if needed. Idempotent: exactly one
    /// node per function object.
    pub fn create_node(&mut self, func: FuncId) -> Result<NodeId> {
        if func.0 >= self.func_count {
            return Err(Error::InvalidIr {
                reason: format!("edge references unknown function {}", func),
            });
        }
        if let Some(&n) = self.func_to_node.get(&func) {
            return Ok(n);
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            func: Some(func),
            in_edges: Vec::new(),
            out_edges: Vec::new(),
            deleted: false,
        });
        self.func_to_node.insert(func, id);
        Ok(id)
    }

    pub fn node_for(&self, func: FuncId) -> Option<NodeId> {
        self.func_to_node.get(&func).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0 as usize]
    }

    /// Live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.deleted)
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Live edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.deleted)
            .map(|(i, e)| (EdgeId(i as u32), e))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.deleted).count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| !e.deleted).count()
    }

    /// Add an edge, deduplicating on (caller, callee, site).
    pub fn add_edge(&mut self, caller: NodeId, callee: NodeId, site: Option<InstrId>) -> EdgeId {
        let key = (caller, callee, site);
        if let Some(&e) = self.edge_index.get(&key) {
            return e;
        }
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            caller,
            callee,
            site,
            deleted: false,
        });
        self.edge_index.insert(key, id);
        self.nodes[caller.0 as usize].out_edges.push(id);
        self.nodes[callee.0 as usize].in_edges.push(id);
        id
    }

    /// Convenience: create both nodes and the edge between them.
    pub fn add_call_edge(
        &mut self,
        caller: FuncId,
        callee: FuncId,
        site: Option<InstrId>,
    ) -> Result<EdgeId> {
        let c = self.create_node(caller)?;
        let d = self.create_node(callee)?;
        Ok(self.add_edge(c, d, site))
    }

    fn kill_edge(&mut self, id: EdgeId) {
        let e = &mut self.edges[id.0 as usize];
        if e.deleted {
            return;
        }
        e.deleted = true;
        let key = (e.caller, e.callee, e.site);
        self.edge_index.remove(&key);
    }

    /// Delete synthetic nodes (thunks, wrappers, bound methods) by
    /// short-circuiting: each in-edge (c, N, s) combined with each
    /// out-edge (N, d) becomes (c, d, s). Self-loops introduced by the
    /// rewrite are discarded and duplicates deduplicated. User-defined and
    /// init functions are never deleted. Idempotent and order-independent;
    /// chains of synthetic nodes collapse fully.
    pub fn delete_synthetic_nodes(&mut self, prog: &Program) {
        loop {
            let target = self.nodes.iter().position(|n| {
                !n.deleted
                    && n.func.is_some_and(|f| {
                        prog.func(f).synthetic.is_some_and(|s| s.is_elidable())
                    })
            });
            let Some(idx) = target else { break };
            let n = NodeId(idx as u32);

            let in_pairs: Vec<(NodeId, Option<InstrId>)> = self.nodes[idx]
                .in_edges
                .iter()
                .map(|&e| &self.edges[e.0 as usize])
                .filter(|e| !e.deleted && e.caller != n)
                .map(|e| (e.caller, e.site))
                .collect();
            let out_targets: Vec<NodeId> = self.nodes[idx]
                .out_edges
                .iter()
                .map(|&e| &self.edges[e.0 as usize])
                .filter(|e| !e.deleted && e.callee != n)
                .map(|e| e.callee)
                .collect();

            for &(c, s) in &in_pairs {
                for &d in &out_targets {
                    if c == d {
                        continue; // rewrite-introduced self-loop
                    }
                    self.add_edge(c, d, s);
                }
            }

            let dead: Vec<EdgeId> = self.nodes[idx]
                .in_edges
                .iter()
                .chain(self.nodes[idx].out_edges.iter())
                .copied()
                .collect();
            for e in dead {
                self.kill_edge(e);
            }
            self.nodes[idx].deleted = true;
            if let Some(f) = self.nodes[idx].func {
                self.func_to_node.shift_remove(&f);
                diagnostics::emit(Event::DeletedSynthetic { func: f });
            }
        }
    }

    /// Depth-first edge visitation. Starts at the root node when present;
    /// remaining components are entered in a stable order keyed on
    /// qualified function name, then declaration position. Out-edges of a
    /// node are visited in insertion order and each edge is yielded
    /// exactly once.
    pub fn visit_edges<E>(
        &self,
        prog: &Program,
        mut visitor: impl FnMut(EdgeId, &Edge) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        let mut seen = vec![false; self.nodes.len()];

        let stable_key = |id: &NodeId| {
            let key = match self.node(*id).func {
                Some(f) => {
                    let pos = prog.func(f).pos;
                    (prog.qualified_name(f), pos.file, pos.offset)
                }
                None => (String::new(), 0, 0),
            };
            (key, *id)
        };
        let has_live_callers = |id: NodeId| {
            self.node(id)
                .in_edges
                .iter()
                .any(|&e| !self.edges[e.0 as usize].deleted)
        };

        // The root first, then nodes with no caller in stable name/position
        // order, then whatever is left (components only reachable through
        // cycles) in the same stable order.
        let mut starts: Vec<NodeId> = Vec::new();
        if let Some(root) = self.root {
            starts.push(root);
        }
        let mut uncalled: Vec<NodeId> = self
            .nodes()
            .map(|(id, _)| id)
            .filter(|id| Some(*id) != self.root && !has_live_callers(*id))
            .collect();
        uncalled.sort_by_cached_key(stable_key);
        starts.extend(uncalled);
        let mut rest: Vec<NodeId> = self
            .nodes()
            .map(|(id, _)| id)
            .filter(|id| Some(*id) != self.root && has_live_callers(*id))
            .collect();
        rest.sort_by_cached_key(stable_key);
        starts.extend(rest);

        for start in starts {
            self.visit_from(start, &mut seen, &mut visitor)?;
        }
        Ok(())
    }

    fn visit_from<E>(
        &self,
        n: NodeId,
        seen: &mut [bool],
        visitor: &mut impl FnMut(EdgeId, &Edge) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        if seen[n.0 as usize] {
            return Ok(());
        }
        seen[n.0 as usize] = true;
        for &e in &self.nodes[n.0 as usize].out_edges {
            let edge = &self.edges[e.0 as usize];
            if edge.deleted {
                continue;
            }
            self.visit_from(edge.callee, seen, visitor)?;
            visitor(e, edge)?;
        }
        Ok(())
    }

    /// `caller -> callee` rendering of every live edge, for tests and
    /// debugging.
    pub fn edge_strings(&self, prog: &Program) -> Vec<String> {
        let name = |n: NodeId| match self.node(n).func {
            Some(f) => prog.qualified_name(f),
            None => "<root>".to_string(),
        };
        self.edges()
            .map(|(_, e)| format!("{} -> {}", name(e.caller), name(e.callee)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssa_ir::builder::ProgramBuilder;
    use ssa_ir::types::{Signature, TypeKind};
    use ssa_ir::Synthetic;

    fn sig(b: &mut ProgramBuilder) -> ssa_ir::TypeId {
        b.types_mut().intern(TypeKind::Signature(Signature {
            params: vec![],
            results: vec![],
            recv: None,
            variadic: false,
        }))
    }

    fn three_funcs() -> (Program, Vec<FuncId>) {
        let mut b = ProgramBuilder::new();
        let sig = sig(&mut b);
        let pkg = b.add_package("main", "main");
        let fs = vec![
            b.declare_func(Some(pkg), "a", sig),
            b.declare_func(Some(pkg), "b", sig),
            b.declare_func(Some(pkg), "c", sig),
        ];
        (b.finish().unwrap(), fs)
    }

    #[test]
    fn test_create_node_is_idempotent() {
        let (prog, fs) = three_funcs();
        let mut g = CallGraph::new(&prog);
        let n1 = g.create_node(fs[0]).unwrap();
        let n2 = g.create_node(fs[0]).unwrap();
        assert_eq!(n1, n2);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn test_add_edge_deduplicates_on_site() {
        let (prog, fs) = three_funcs();
        let mut g = CallGraph::new(&prog);
        let e1 = g.add_call_edge(fs[0], fs[1], None).unwrap();
        let e2 = g.add_call_edge(fs[0], fs[1], None).unwrap();
        assert_eq!(e1, e2);
        assert_eq!(g.edge_count(), 1);

        // A different site is a distinct edge.
        let e3 = g.add_call_edge(fs[0], fs[1], Some(InstrId(0))).unwrap();
        assert_ne!(e1, e3);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_unknown_function_is_invalid_ir() {
        let (prog, fs) = three_funcs();
        let mut g = CallGraph::new(&prog);
        let bogus = FuncId(99);
        assert!(matches!(
            g.add_call_edge(fs[0], bogus, None),
            Err(Error::InvalidIr { .. })
        ));
    }

    #[test]
    fn test_delete_synthetic_short_circuit() {
        let mut b = ProgramBuilder::new();
        let s = sig(&mut b);
        let pkg = b.add_package("main", "main");
        let main = b.declare_func(Some(pkg), "main", s);
        let thunk = b.declare_func(None, "thunk", s);
        b.set_synthetic(thunk, Synthetic::Thunk);
        let target = b.declare_func(Some(pkg), "target", s);
        let prog = b.finish().unwrap();

        let mut g = CallGraph::new(&prog);
        g.add_call_edge(main, thunk, None).unwrap();
        g.add_call_edge(thunk, target, None).unwrap();
        g.delete_synthetic_nodes(&prog);

        assert_eq!(g.node_for(thunk), None);
        assert_eq!(
            g.edge_strings(&prog),
            vec!["main.main -> main.target".to_string()]
        );

        // Idempotent.
        g.delete_synthetic_nodes(&prog);
        assert_eq!(
            g.edge_strings(&prog),
            vec!["main.main -> main.target".to_string()]
        );
    }

    #[test]
    fn test_delete_synthetic_chain_and_self_loop() {
        let mut b = ProgramBuilder::new();
        let s = sig(&mut b);
        let pkg = b.add_package("main", "main");
        let main = b.declare_func(Some(pkg), "main", s);
        let w1 = b.declare_func(None, "w1", s);
        let w2 = b.declare_func(None, "w2", s);
        b.set_synthetic(w1, Synthetic::Wrapper);
        b.set_synthetic(w2, Synthetic::Bound);
        let prog = b.finish().unwrap();

        let mut g = CallGraph::new(&prog);
        // main -> w1 -> w2 -> main: collapsing both wrappers leaves a
        // main -> main rewrite product, which is discarded as a self-loop.
        g.add_call_edge(main, w1, None).unwrap();
        g.add_call_edge(w1, w2, None).unwrap();
        g.add_call_edge(w2, main, None).unwrap();
        g.delete_synthetic_nodes(&prog);

        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.node_for(w1), None);
        assert_eq!(g.node_for(w2), None);
    }

    #[test]
    fn test_visit_edges_deterministic_and_complete() {
        let (prog, fs) = three_funcs();
        let mut g = CallGraph::new(&prog);
        g.add_call_edge(fs[0], fs[1], None).unwrap();
        g.add_call_edge(fs[1], fs[2], None).unwrap();
        g.add_call_edge(fs[0], fs[2], None).unwrap();

        let collect = |g: &CallGraph| {
            let mut out = Vec::new();
            g.visit_edges(&prog, |id, _| {
                out.push(id);
                Ok::<(), ()>(())
            })
            .unwrap();
            out
        };
        let first = collect(&g);
        let second = collect(&g);
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }
}
