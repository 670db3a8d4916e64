//! Rapid type analysis.
//!
//! RTA refines CHA by demanding justification for every dynamic-call
//! target: a function is analyzed only once something calls it, and an
//! interface dispatch only reaches the method of a concrete type that has
//! actually been boxed (`make-interface`) somewhere along a reachable
//! path. Higher-order dispatch is likewise restricted to functions whose
//! address was taken in reachable code.
//!
//! The analysis is a worklist fixpoint over three monotone tables;
//! termination follows from the finite function and type universes.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use ssa_ir::types::SigKey;
use ssa_ir::{CallTarget, FuncId, InstrId, InstrKind, Program, Synthetic, TypeId, ValueId, ValueKind};

use crate::cancel::{self, CancelToken};
use crate::diagnostics::{self, Event};
use crate::error::{Error, Result};
use crate::graph::CallGraph;

/// The result of an RTA run: the call graph plus the reachability and
/// runtime-type facts the fixpoint computed, for downstream consumers.
#[derive(Debug)]
pub struct RtaResult {
    pub call_graph: CallGraph,
    /// Functions proved reachable from the roots.
    pub reachable: IndexSet<FuncId>,
    /// Concrete types observed as make-interface operands in reachable
    /// code.
    pub runtime_types: IndexSet<TypeId>,
}

/// A dynamic interface call site pending (re-)resolution.
#[derive(Debug, Clone, Copy)]
struct InvokeSite {
    caller: FuncId,
    site: InstrId,
}

struct RtaEngine<'a> {
    prog: &'a Program,
    cg: CallGraph,
    reachable: IndexSet<FuncId>,
    live_types: IndexSet<TypeId>,
    /// (interface, method) -> sites waiting on new live types.
    pending_invokes: IndexMap<(TypeId, String), Vec<InvokeSite>>,
    /// signature -> higher-order sites waiting on new address-taken
    /// functions.
    pending_indirect: IndexMap<SigKey, Vec<InvokeSite>>,
    /// Address-taken functions observed in reachable code, by signature.
    addr_taken: IndexMap<SigKey, IndexSet<FuncId>>,
    worklist: VecDeque<FuncId>,
}

impl<'a> RtaEngine<'a> {
    fn new(prog: &'a Program, roots: &[FuncId]) -> Result<Self> {
        if roots.is_empty() {
            return Err(Error::NoEntryPoint);
        }
        let cg = CallGraph::with_root(prog, roots)?;
        let mut engine = Self {
            prog,
            cg,
            reachable: IndexSet::new(),
            live_types: IndexSet::new(),
            pending_invokes: IndexMap::new(),
            pending_indirect: IndexMap::new(),
            addr_taken: IndexMap::new(),
            worklist: VecDeque::new(),
        };
        for &r in roots {
            engine.enqueue(r);
        }
        Ok(engine)
    }

    fn enqueue(&mut self, f: FuncId) {
        if self.reachable.insert(f) {
            self.worklist.push_back(f);
        }
    }

    fn run(mut self, cancel: Option<&CancelToken>) -> Result<RtaResult> {
        while let Some(f) = self.worklist.pop_front() {
            cancel::check(cancel)?;
            self.visit_function(f)?;
        }
        Ok(RtaResult {
            call_graph: self.cg,
            reachable: self.reachable,
            runtime_types: self.live_types,
        })
    }

    /// Scan a newly reachable function: record live types and address
    /// taking, resolve its call sites against current facts, and leave
    /// pending entries for facts discovered later.
    fn visit_function(&mut self, f: FuncId) -> Result<()> {
        let func = self.prog.func(f);
        if !func.is_defined() {
            diagnostics::emit(Event::SkippedExternal { func: f });
            return Ok(());
        }

        // A reachable synthetic package initializer pulls in its package's
        // numbered init functions, in declaration order.
        if let Some(pkg) = func.pkg {
            let p = self.prog.package(pkg);
            if p.init == Some(f) {
                for k in p.ninit.clone() {
                    self.cg.add_call_edge(f, k, None)?;
                    self.enqueue(k);
                }
            }
        }

        let sites: Vec<InstrId> = self.prog.func_instrs(f).collect();
        for site in sites {
            let instr = self.prog.instr(site);
            match &instr.kind {
                InstrKind::MakeInterface { x } => {
                    let t = self.prog.value(*x).ty;
                    self.add_live_type(t)?;
                }
                InstrKind::MakeClosure {
                    func: closure_fn, ..
                } => {
                    self.note_address_taken(*closure_fn)?;
                }
                InstrKind::Range { x } => {
                    let x = *x;
                    // Ranging over a function value calls the iterator,
                    // which in turn drives the loop's yield body.
                    if self.prog.types().as_signature(self.prog.value(x).ty).is_some() {
                        let iterator = ranged_function(self.prog, x);
                        match iterator {
                            Some(g) => {
                                self.cg.add_call_edge(f, g, Some(site))?;
                                self.enqueue(g);
                            }
                            None => {
                                self.resolve_indirect_site(
                                    InvokeSite { caller: f, site },
                                    self.prog.value(x).ty,
                                )?;
                            }
                        }
                        self.enqueue_yield_bodies(f, iterator, site)?;
                    }
                }
                _ => {}
            }

            if let Some(common) = instr.call_common() {
                // Function symbols passed as arguments (not as the callee)
                // count as address-taken.
                for &arg in &common.args {
                    if let ValueKind::Function(g) = self.prog.value(arg).kind {
                        self.note_address_taken(g)?;
                    }
                }
                if let Some(callee) = common.static_callee(self.prog) {
                    self.cg.add_call_edge(f, callee, Some(site))?;
                    self.enqueue(callee);
                } else {
                    match &common.callee {
                        CallTarget::Invoke { recv, method } => {
                            let iface = self.prog.value(*recv).ty;
                            self.resolve_invoke_site(
                                InvokeSite { caller: f, site },
                                iface,
                                method.clone(),
                            )?;
                        }
                        CallTarget::Value(_) => {
                            self.resolve_indirect_site(
                                InvokeSite { caller: f, site },
                                common.signature,
                            )?;
                        }
                    }
                }
            } else {
                // Any other instruction holding a function symbol takes
                // its address.
                for op in instr.operands() {
                    if let ValueKind::Function(g) = self.prog.value(op).kind {
                        self.note_address_taken(g)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// A new dynamic interface site: resolve against already-live types
    /// and park it for types that become live later.
    fn resolve_invoke_site(
        &mut self,
        at: InvokeSite,
        iface: TypeId,
        method: String,
    ) -> Result<()> {
        let live: Vec<TypeId> = self.live_types.iter().copied().collect();
        let mut hit = false;
        for t in live {
            if self.prog.implements(t, iface) {
                if let Some(callee) = self.prog.lookup_method(t, &method) {
                    hit = true;
                    self.cg.add_call_edge(at.caller, callee, Some(at.site))?;
                    self.enqueue(callee);
                }
            }
        }
        if !hit {
            diagnostics::emit(Event::EmptyCandidateSet {
                site: at.site,
                method: Some(method.clone()),
            });
        }
        self.pending_invokes
            .entry((iface, method))
            .or_default()
            .push(at);
        Ok(())
    }

    /// A new higher-order site: resolve against already address-taken
    /// functions and park it for functions discovered later.
    fn resolve_indirect_site(&mut self, at: InvokeSite, signature: TypeId) -> Result<()> {
        let Some(key) = self.prog.types().sig_key(signature) else {
            return Ok(());
        };
        let known: Vec<FuncId> = self
            .addr_taken
            .get(&key)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        if known.is_empty() {
            diagnostics::emit(Event::EmptyCandidateSet {
                site: at.site,
                method: None,
            });
        }
        for g in known {
            self.cg.add_call_edge(at.caller, g, Some(at.site))?;
            self.enqueue(g);
        }
        self.pending_indirect.entry(key).or_default().push(at);
        Ok(())
    }

    /// A concrete type became live: re-examine pending invoke sites whose
    /// interface it satisfies.
    fn add_live_type(&mut self, t: TypeId) -> Result<()> {
        if !self.live_types.insert(t) {
            return Ok(());
        }
        let pending: Vec<((TypeId, String), Vec<InvokeSite>)> = self
            .pending_invokes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for ((iface, method), sites) in pending {
            if !self.prog.implements(t, iface) {
                continue;
            }
            if let Some(callee) = self.prog.lookup_method(t, &method) {
                for at in sites {
                    self.cg.add_call_edge(at.caller, callee, Some(at.site))?;
                }
                self.enqueue(callee);
            }
        }
        Ok(())
    }

    /// A range-over-func statement became reachable: its loop bodies are
    /// the synthetic yield functions enclosed by the ranging function, and
    /// the iterator invokes them as soon as it runs.
    fn enqueue_yield_bodies(
        &mut self,
        f: FuncId,
        iterator: Option<FuncId>,
        site: InstrId,
    ) -> Result<()> {
        for y in self.prog.all_functions() {
            let yf = self.prog.func(y);
            if yf.enclosing != Some(f) || yf.synthetic != Some(Synthetic::RangeYield) {
                continue;
            }
            // With an unresolved iterator the edge is attributed to the
            // ranging function itself.
            self.cg.add_call_edge(iterator.unwrap_or(f), y, Some(site))?;
            self.enqueue(y);
        }
        Ok(())
    }

    /// A function's address was taken in reachable code: re-examine
    /// pending higher-order sites of its signature.
    fn note_address_taken(&mut self, g: FuncId) -> Result<()> {
        let Some(key) = self.prog.types().sig_key(self.prog.func(g).signature) else {
            return Ok(());
        };
        if !self.addr_taken.entry(key.clone()).or_default().insert(g) {
            return Ok(());
        }
        let sites: Vec<InvokeSite> = self.pending_indirect.get(&key).cloned().unwrap_or_default();
        for at in sites {
            self.cg.add_call_edge(at.caller, g, Some(at.site))?;
            self.enqueue(g);
        }
        Ok(())
    }
}

/// The statically known iterator of a range instruction over a function
/// value: a function symbol or an immediately preceding make-closure.
fn ranged_function(prog: &Program, x: ValueId) -> Option<FuncId> {
    match prog.value(x).kind {
        ValueKind::Function(g) => Some(g),
        ValueKind::Register { instr } => match prog.instr(instr).kind {
            InstrKind::MakeClosure { func, .. } => Some(func),
            _ => None,
        },
        _ => None,
    }
}

/// Analyze the program from `roots` (typically `init` and `main` of every
/// main package in scope). Fails with [`Error::NoEntryPoint`] when the
/// root set is empty.
pub fn analyze(
    prog: &Program,
    roots: &[FuncId],
    cancel: Option<&CancelToken>,
) -> Result<RtaResult> {
    RtaEngine::new(prog, roots)?.run(cancel)
}
