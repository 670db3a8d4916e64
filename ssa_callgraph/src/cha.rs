//! Class-hierarchy analysis.
//!
//! CHA resolves a dynamic call purely from declared types: an interface
//! invocation may reach the matching method of *every* concrete type that
//! satisfies the receiver interface, and an indirect call of a function
//! value may reach every function whose signature matches the site's.
//! The result is sound but imprecise: a superset of the true runtime call
//! graph.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use ssa_ir::types::SigKey;
use ssa_ir::{CallTarget, FuncId, Program, TypeId};

use crate::cancel::{self, CancelToken};
use crate::diagnostics::{self, Event};
use crate::error::Result;
use crate::graph::CallGraph;

/// Lazily computed dispatch tables shared by the per-site resolution loop.
struct DispatchTables<'a> {
    prog: &'a Program,
    /// All concrete candidate receiver types: declared named non-interface
    /// types and their pointer forms, in type-id order.
    universe: Vec<TypeId>,
    /// Functions by receiver-stripped signature, in traversal order.
    by_sig: IndexMap<SigKey, Vec<FuncId>>,
    /// (interface, method) -> implementations, memoized.
    impls: HashMap<(TypeId, String), Arc<Vec<FuncId>>>,
}

impl<'a> DispatchTables<'a> {
    fn new(prog: &'a Program) -> Self {
        let store = prog.types();
        let mut universe = Vec::new();
        for id in store.ids() {
            if store.as_named(id).is_some() && !store.is_interface(id) {
                universe.push(id);
                // The pointer form exists: the builder interns it on freeze.
                if let Some(p) = store_pointer(prog, id) {
                    universe.push(p);
                }
            }
        }

        let mut by_sig: IndexMap<SigKey, Vec<FuncId>> = IndexMap::new();
        for f in prog.all_functions() {
            if let Some(key) = store.sig_key(prog.func(f).signature) {
                by_sig.entry(key).or_default().push(f);
            }
        }

        Self {
            prog,
            universe,
            by_sig,
            impls: HashMap::new(),
        }
    }

    /// Every implementation of `method` reachable through interface
    /// `iface`, over the whole concrete-type universe.
    fn implementations(&mut self, iface: TypeId, method: &str) -> Arc<Vec<FuncId>> {
        let key = (iface, method.to_string());
        if let Some(hit) = self.impls.get(&key) {
            return Arc::clone(hit);
        }
        let mut out = Vec::new();
        for &t in &self.universe {
            if self.prog.implements(t, iface) {
                if let Some(f) = self.prog.lookup_method(t, method) {
                    if !out.contains(&f) {
                        out.push(f);
                    }
                }
            }
        }
        let out = Arc::new(out);
        self.impls.insert(key, Arc::clone(&out));
        out
    }

    fn matching_sig(&self, sig: TypeId) -> &[FuncId] {
        self.prog
            .types()
            .sig_key(sig)
            .and_then(|key| self.by_sig.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Look up the already-interned pointer form of a type without mutating
/// the frozen store.
fn store_pointer(prog: &Program, elem: TypeId) -> Option<TypeId> {
    let store = prog.types();
    store
        .ids()
        .find(|id| matches!(store.kind(*id), ssa_ir::types::TypeKind::Pointer { elem: e } if *e == elem))
}

pub fn call_graph(prog: &Program, cancel: Option<&CancelToken>) -> Result<CallGraph> {
    let mut cg = CallGraph::new(prog);
    let mut tables = DispatchTables::new(prog);

    for f in prog.all_functions() {
        cancel::check(cancel)?;
        if !prog.func(f).is_defined() {
            continue;
        }
        for site in prog.func_instrs(f) {
            let Some(common) = prog.instr(site).call_common() else {
                continue;
            };
            if let Some(callee) = common.static_callee(prog) {
                cg.add_call_edge(f, callee, Some(site))?;
                continue;
            }
            match &common.callee {
                CallTarget::Invoke { recv, method } => {
                    let iface = prog.value(*recv).ty;
                    let impls = tables.implementations(iface, method);
                    if impls.is_empty() {
                        diagnostics::emit(Event::EmptyCandidateSet {
                            site,
                            method: Some(method.clone()),
                        });
                    }
                    for &callee in impls.iter() {
                        cg.add_call_edge(f, callee, Some(site))?;
                    }
                }
                CallTarget::Value(_) => {
                    let candidates: Vec<FuncId> =
                        tables.matching_sig(common.signature).to_vec();
                    if candidates.is_empty() {
                        diagnostics::emit(Event::EmptyCandidateSet { site, method: None });
                    }
                    for callee in candidates {
                        cg.add_call_edge(f, callee, Some(site))?;
                    }
                }
            }
        }
    }
    Ok(cg)
}
