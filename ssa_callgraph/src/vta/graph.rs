//! The type-propagation graph.
//!
//! Nodes are abstract locations: SSA registers, globals, struct fields
//! keyed by (struct type, field index), map keys/values and channel
//! elements keyed by container type, and function parameter/result slots.
//! Edges mean "values may flow to". Each node carries the set of flow
//! elements (concrete types from boxing, function values from closures and
//! symbols) it may hold.

use indexmap::{IndexMap, IndexSet};
use ssa_ir::{
    CallCommon, CallTarget, FuncId, GlobalId, InstrId, InstrKind, Program, TypeId, UnOpKind,
    ValueId, ValueKind,
};

use crate::error::Result;
use crate::graph::CallGraph;

/// An abstract location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TpgNode {
    Register(ValueId),
    Global(GlobalId),
    Field { strukt: TypeId, field: u32 },
    MapKey(TypeId),
    MapValue(TypeId),
    ChanElem(TypeId),
    Param { func: FuncId, index: u32 },
    Result { func: FuncId, index: u32 },
}

/// What flows: concrete types (interface boxing) and function values
/// (closures and function symbols).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Flow {
    Type(TypeId),
    Func(FuncId),
}

#[derive(Debug, Default)]
pub(crate) struct TypePropGraph {
    nodes: IndexMap<TpgNode, u32>,
    pub(crate) succs: Vec<IndexSet<u32>>,
    pub(crate) types: Vec<IndexSet<Flow>>,
}

impl TypePropGraph {
    pub(crate) fn len(&self) -> usize {
        self.succs.len()
    }

    pub(crate) fn node(&mut self, n: TpgNode) -> u32 {
        if let Some(&idx) = self.nodes.get(&n) {
            return idx;
        }
        let idx = self.succs.len() as u32;
        self.nodes.insert(n, idx);
        self.succs.push(IndexSet::new());
        self.types.push(IndexSet::new());
        idx
    }

    pub(crate) fn lookup(&self, n: &TpgNode) -> Option<u32> {
        self.nodes.get(n).copied()
    }

    pub(crate) fn add_edge(&mut self, from: u32, to: u32) {
        if from != to {
            self.succs[from as usize].insert(to);
        }
    }

    pub(crate) fn add_flow(&mut self, at: u32, flow: Flow) {
        self.types[at as usize].insert(flow);
    }

    /// The solved flow set at an abstract location.
    pub(crate) fn types_at(&self, n: &TpgNode) -> Option<&IndexSet<Flow>> {
        self.lookup(n).map(|idx| &self.types[idx as usize])
    }
}

/// A dynamic call site awaiting resolution against the solved graph.
#[derive(Debug)]
pub(crate) struct DynSite {
    pub(crate) caller: FuncId,
    pub(crate) site: InstrId,
    /// Node holding the receiver (invoke) or function value (higher-order).
    pub(crate) recv: u32,
    /// Interface and method name for invoke sites; None for higher-order.
    pub(crate) invoke: Option<(TypeId, String)>,
    /// Argument nodes, excluding the invoke receiver.
    pub(crate) args: Vec<Option<u32>>,
    /// Call-result node, for value-producing calls.
    pub(crate) result: Option<u32>,
    /// Callees already resolved; edges and wiring are added once each.
    pub(crate) resolved: IndexSet<FuncId>,
}

/// Builds the propagation graph for a chosen function subset and collects
/// the dynamic sites, adding static call edges to the output graph along
/// the way.
pub(crate) struct TpgBuilder<'a> {
    prog: &'a Program,
    funcs: &'a IndexSet<FuncId>,
    pub(crate) graph: TypePropGraph,
    pub(crate) dyn_sites: Vec<DynSite>,
}

impl<'a> TpgBuilder<'a> {
    pub(crate) fn new(prog: &'a Program, funcs: &'a IndexSet<FuncId>) -> Self {
        Self {
            prog,
            funcs,
            graph: TypePropGraph::default(),
            dyn_sites: Vec::new(),
        }
    }

    /// Node for a value used as data, or None for constants and builtins.
    /// Function symbols get a register node seeded with their own flow.
    fn value_node(&mut self, v: ValueId) -> Option<u32> {
        match &self.prog.value(v).kind {
            ValueKind::Const(_) | ValueKind::Builtin(_) => None,
            ValueKind::Function(f) => {
                let f = *f;
                let idx = self.graph.node(TpgNode::Register(v));
                self.graph.add_flow(idx, Flow::Func(f));
                Some(idx)
            }
            _ => Some(self.graph.node(TpgNode::Register(v))),
        }
    }

    /// The abstract location a load from / store through `addr` touches.
    /// Direct field addresses and globals get their canonical shared node;
    /// everything else falls back to the address register itself.
    fn deref_node(&mut self, addr: ValueId) -> u32 {
        match &self.prog.value(addr).kind {
            ValueKind::Global(g) => self.graph.node(TpgNode::Global(*g)),
            ValueKind::Register { instr } => {
                if let InstrKind::FieldAddr { x, field } = self.prog.instr(*instr).kind {
                    let strukt = self.field_struct(x);
                    self.graph.node(TpgNode::Field { strukt, field })
                } else {
                    self.graph.node(TpgNode::Register(addr))
                }
            }
            _ => self.graph.node(TpgNode::Register(addr)),
        }
    }

    /// The struct type that keys a field location: the pointee of the
    /// field-address operand.
    fn field_struct(&self, x: ValueId) -> TypeId {
        let store = self.prog.types();
        let ty = self.prog.value(x).ty;
        match store.kind(store.underlying(ty)) {
            ssa_ir::types::TypeKind::Pointer { elem } => *elem,
            _ => ty,
        }
    }

    /// Container key for map/channel element locations.
    fn container_key(&self, v: ValueId) -> TypeId {
        self.prog.types().underlying(self.prog.value(v).ty)
    }

    fn flow_to(&mut self, from: ValueId, to: u32) {
        if let Some(src) = self.value_node(from) {
            self.graph.add_edge(src, to);
        }
    }

    fn result_node(&mut self, site: InstrId) -> Option<u32> {
        self.prog
            .instr(site)
            .result
            .and_then(|r| self.value_node(r))
    }

    /// Process every function in the subset. Static call edges go straight
    /// into `cg`; dynamic sites are parked in `dyn_sites`.
    pub(crate) fn build(&mut self, cg: &mut CallGraph) -> Result<()> {
        let mut order: Vec<FuncId> = self.funcs.iter().copied().collect();
        order.sort();
        for f in order {
            if self.prog.func(f).is_defined() {
                self.build_function(f, cg)?;
            } else {
                self.stub_function(f);
            }
        }
        Ok(())
    }

    /// A function without a body: introduce its parameter and result
    /// locations, connected to nothing.
    fn stub_function(&mut self, f: FuncId) {
        let Some(sig) = self.prog.types().as_signature(self.prog.func(f).signature) else {
            return;
        };
        let nparams = sig.params.len() + usize::from(sig.recv.is_some());
        let nresults = sig.results.len();
        for i in 0..nparams {
            self.graph.node(TpgNode::Param {
                func: f,
                index: i as u32,
            });
        }
        for i in 0..nresults {
            self.graph.node(TpgNode::Result {
                func: f,
                index: i as u32,
            });
        }
    }

    fn build_function(&mut self, f: FuncId, cg: &mut CallGraph) -> Result<()> {
        // Parameter slots feed the parameter registers.
        let params = self.prog.func(f).params.clone();
        for (i, p) in params.iter().enumerate() {
            let slot = self.graph.node(TpgNode::Param {
                func: f,
                index: i as u32,
            });
            if let Some(reg) = self.value_node(*p) {
                self.graph.add_edge(slot, reg);
            }
        }

        let sites: Vec<InstrId> = self.prog.func_instrs(f).collect();
        for site in sites {
            self.build_instr(f, site, cg)?;
        }
        Ok(())
    }

    fn build_instr(&mut self, f: FuncId, site: InstrId, cg: &mut CallGraph) -> Result<()> {
        let kind = self.prog.instr(site).kind.clone();
        match &kind {
            InstrKind::Phi { edges } => {
                if let Some(res) = self.result_node(site) {
                    for &e in edges {
                        self.flow_to(e, res);
                    }
                }
            }
            InstrKind::UnOp { op, x, .. } => match op {
                UnOpKind::Load => {
                    let src = self.deref_node(*x);
                    if let Some(res) = self.result_node(site) {
                        self.graph.add_edge(src, res);
                    }
                }
                UnOpKind::Recv => {
                    let key = self.container_key(*x);
                    let src = self.graph.node(TpgNode::ChanElem(key));
                    if let Some(res) = self.result_node(site) {
                        self.graph.add_edge(src, res);
                    }
                }
                _ => {}
            },
            InstrKind::Field { x, field } => {
                let strukt = self.field_struct(*x);
                let src = self.graph.node(TpgNode::Field {
                    strukt,
                    field: *field,
                });
                if let Some(res) = self.result_node(site) {
                    self.graph.add_edge(src, res);
                }
            }
            InstrKind::FieldAddr { x, field } => {
                // Content types ride along pointer copies, so loads through
                // a copied field address still see the field's types.
                let strukt = self.field_struct(*x);
                let src = self.graph.node(TpgNode::Field {
                    strukt,
                    field: *field,
                });
                if let Some(res) = self.result_node(site) {
                    self.graph.add_edge(src, res);
                }
            }
            InstrKind::Index { x, .. } | InstrKind::IndexAddr { x, .. } => {
                if let Some(res) = self.result_node(site) {
                    self.flow_to(*x, res);
                }
            }
            InstrKind::Lookup { map, .. } => {
                let key = self.container_key(*map);
                let src = self.graph.node(TpgNode::MapValue(key));
                if let Some(res) = self.result_node(site) {
                    self.graph.add_edge(src, res);
                }
            }
            InstrKind::MapUpdate { map, key, value } => {
                let mt = self.container_key(*map);
                let k = self.graph.node(TpgNode::MapKey(mt));
                self.flow_to(*key, k);
                let v = self.graph.node(TpgNode::MapValue(mt));
                self.flow_to(*value, v);
            }
            InstrKind::Send { chan, x } => {
                let ct = self.container_key(*chan);
                let elem = self.graph.node(TpgNode::ChanElem(ct));
                self.flow_to(*x, elem);
            }
            InstrKind::Select { states, .. } => {
                for s in states {
                    let ct = self.container_key(s.chan);
                    let elem = self.graph.node(TpgNode::ChanElem(ct));
                    match s.send {
                        Some(v) => self.flow_to(v, elem),
                        None => {
                            if let Some(res) = self.result_node(site) {
                                self.graph.add_edge(elem, res);
                            }
                        }
                    }
                }
            }
            InstrKind::Range { x } => {
                if let Some(res) = self.result_node(site) {
                    self.flow_to(*x, res);
                }
            }
            InstrKind::Next { iter, is_string } => {
                if !*is_string {
                    let key = self.container_key(*iter);
                    match self.prog.types().kind(key) {
                        ssa_ir::types::TypeKind::Map { .. } => {
                            let k = self.graph.node(TpgNode::MapKey(key));
                            let v = self.graph.node(TpgNode::MapValue(key));
                            if let Some(res) = self.result_node(site) {
                                self.graph.add_edge(k, res);
                                self.graph.add_edge(v, res);
                            }
                        }
                        ssa_ir::types::TypeKind::Chan { .. } => {
                            let elem = self.graph.node(TpgNode::ChanElem(key));
                            if let Some(res) = self.result_node(site) {
                                self.graph.add_edge(elem, res);
                            }
                        }
                        _ => {
                            if let Some(res) = self.result_node(site) {
                                self.flow_to(*iter, res);
                            }
                        }
                    }
                }
            }
            InstrKind::Extract { tuple, .. } => {
                if let Some(res) = self.result_node(site) {
                    self.flow_to(*tuple, res);
                }
            }
            InstrKind::MakeInterface { x } => {
                if let Some(res) = self.result_node(site) {
                    let t = self.prog.value(*x).ty;
                    self.graph.add_flow(res, Flow::Type(t));
                    // Function values boxed into interfaces keep flowing.
                    self.flow_to(*x, res);
                }
            }
            InstrKind::MakeClosure { func, bindings } => {
                if let Some(res) = self.result_node(site) {
                    self.graph.add_flow(res, Flow::Func(*func));
                }
                if self.funcs.contains(func) && self.prog.func(*func).is_defined() {
                    let free_vars = self.prog.func(*func).free_vars.clone();
                    for (b, fv) in bindings.iter().zip(free_vars) {
                        if let Some(dst) = self.value_node(fv) {
                            self.flow_to(*b, dst);
                        }
                    }
                }
            }
            InstrKind::ChangeType { x }
            | InstrKind::Convert { x }
            | InstrKind::MultiConvert { x }
            | InstrKind::ChangeInterface { x }
            | InstrKind::SliceToArrayPointer { x }
            | InstrKind::TypeAssert { x, .. } => {
                if let Some(res) = self.result_node(site) {
                    self.flow_to(*x, res);
                }
            }
            InstrKind::Store { addr, val } => {
                let dst = self.deref_node(*addr);
                self.flow_to(*val, dst);
            }
            InstrKind::Return { results } => {
                for (i, r) in results.iter().enumerate() {
                    let slot = self.graph.node(TpgNode::Result {
                        func: f,
                        index: i as u32,
                    });
                    self.flow_to(*r, slot);
                }
            }
            InstrKind::Call(common) | InstrKind::Defer(common) | InstrKind::Go(common) => {
                self.build_call(f, site, common, cg)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn build_call(
        &mut self,
        f: FuncId,
        site: InstrId,
        common: &CallCommon,
        cg: &mut CallGraph,
    ) -> Result<()> {
        if let Some(callee) = common.static_callee(self.prog) {
            cg.add_call_edge(f, callee, Some(site))?;
            self.wire_static(site, common, callee);
            return Ok(());
        }
        match &common.callee {
            CallTarget::Invoke { recv, method } => {
                let Some(recv_node) = self.value_node(*recv) else {
                    return Ok(());
                };
                let iface = self.prog.value(*recv).ty;
                let args = self.arg_nodes(common);
                let result = self.result_node(site);
                self.dyn_sites.push(DynSite {
                    caller: f,
                    site,
                    recv: recv_node,
                    invoke: Some((iface, method.clone())),
                    args,
                    result,
                    resolved: IndexSet::new(),
                });
            }
            CallTarget::Value(v) => {
                let Some(recv_node) = self.value_node(*v) else {
                    return Ok(());
                };
                let args = self.arg_nodes(common);
                let result = self.result_node(site);
                self.dyn_sites.push(DynSite {
                    caller: f,
                    site,
                    recv: recv_node,
                    invoke: None,
                    args,
                    result,
                    resolved: IndexSet::new(),
                });
            }
        }
        Ok(())
    }

    fn arg_nodes(&mut self, common: &CallCommon) -> Vec<Option<u32>> {
        common.args.iter().map(|&a| self.value_node(a)).collect()
    }

    /// Connect argument flows to a statically known callee's parameter
    /// slots and its result slots back to the call result.
    fn wire_static(&mut self, site: InstrId, common: &CallCommon, callee: FuncId) {
        if !self.funcs.contains(&callee) {
            return;
        }
        for (i, &a) in common.args.iter().enumerate() {
            let slot = self.graph.node(TpgNode::Param {
                func: callee,
                index: i as u32,
            });
            self.flow_to(a, slot);
        }
        self.wire_results(site, callee);
    }

    pub(crate) fn wire_results_for(
        graph: &mut TypePropGraph,
        prog: &Program,
        result: Option<u32>,
        callee: FuncId,
    ) {
        let Some(res) = result else { return };
        let Some(sig) = prog.types().as_signature(prog.func(callee).signature) else {
            return;
        };
        for i in 0..sig.results.len() {
            let slot = graph.node(TpgNode::Result {
                func: callee,
                index: i as u32,
            });
            graph.add_edge(slot, res);
        }
    }

    fn wire_results(&mut self, site: InstrId, callee: FuncId) {
        let result = self.result_node(site);
        Self::wire_results_for(&mut self.graph, self.prog, result, callee);
    }

    pub(crate) fn into_parts(self) -> (TypePropGraph, Vec<DynSite>) {
        (self.graph, self.dyn_sites)
    }
}
