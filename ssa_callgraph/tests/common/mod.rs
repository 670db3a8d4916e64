//! Shared program fixtures for the analyzer test suites.

use ssa_ir::builder::ProgramBuilder;
use ssa_ir::types::{AbstractMethod, Basic, Named, Signature, TypeKind};
use ssa_ir::{
    CallCommon, CallTarget, FuncId, InstrKind, PkgId, Program, Synthetic, TypeId, UnOpKind,
};

pub fn void_sig(b: &mut ProgramBuilder) -> TypeId {
    b.types_mut().intern(TypeKind::Signature(Signature {
        params: vec![],
        results: vec![],
        recv: None,
        variadic: false,
    }))
}

fn named(b: &mut ProgramBuilder, pkg: PkgId, name: &str, underlying: TypeId) -> TypeId {
    b.types_mut().declare_named(Named {
        name: name.to_string(),
        pkg: Some(pkg),
        underlying,
        methods: vec![],
        type_params: vec![],
        type_args: vec![],
        origin: None,
    })
}

/// Declare a no-op method `F` on `recv` and give it a body.
fn add_method_f(b: &mut ProgramBuilder, pkg: PkgId, recv: TypeId) -> FuncId {
    let sig = b.types_mut().intern(TypeKind::Signature(Signature {
        params: vec![],
        results: vec![],
        recv: Some(recv),
        variadic: false,
    }));
    let f = b.declare_func(Some(pkg), "F", sig);
    b.types_mut().add_method(recv, "F", f);
    let mut fb = b.func_builder(f);
    fb.new_block();
    fb.add_param("recv", recv);
    fb.ret(vec![]);
    f
}

/// A helper `call(i I) { i.F() }`.
fn add_call_helper(
    b: &mut ProgramBuilder,
    pkg: PkgId,
    name: &str,
    call_sig: TypeId,
    i_ty: TypeId,
    method_sig: TypeId,
) -> FuncId {
    let f = b.declare_func(Some(pkg), name, call_sig);
    let mut fb = b.func_builder(f);
    fb.new_block();
    let i = fb.add_param("i", i_ty);
    fb.push(InstrKind::Call(CallCommon {
        callee: CallTarget::Invoke {
            recv: i,
            method: "F".to_string(),
        },
        args: vec![],
        signature: method_sig,
    }));
    fb.ret(vec![]);
    f
}

/// A main that boxes a `boxed` value into `I` and hands it to `callee`.
fn add_main(
    b: &mut ProgramBuilder,
    pkg: PkgId,
    boxed: TypeId,
    i_ty: TypeId,
    callee: FuncId,
    call_sig: TypeId,
) -> FuncId {
    let vs = void_sig(b);
    let f = b.declare_func(Some(pkg), "main", vs);
    let callee_val = b.func_value(callee);
    let pboxed = b.types_mut().pointer(boxed);
    let mut fb = b.func_builder(f);
    fb.new_block();
    let slot = fb.push_value(InstrKind::Alloc { heap: false }, pboxed);
    let v = fb.push_value(
        InstrKind::UnOp {
            op: UnOpKind::Load,
            x: slot,
            comma_ok: false,
        },
        boxed,
    );
    let boxed_val = fb.push_value(InstrKind::MakeInterface { x: v }, i_ty);
    fb.push(InstrKind::Call(CallCommon {
        callee: CallTarget::Value(callee_val),
        args: vec![boxed_val],
        signature: call_sig,
    }));
    fb.ret(vec![]);
    f
}

pub struct IfaceProgram {
    pub prog: Program,
    pub m1_main: FuncId,
    pub m2_main: FuncId,
    /// The shared helper, or the generic origin in the instanced variant.
    pub call: FuncId,
    /// Per-caller instances of the helper (instanced variant only).
    pub call_insts: Vec<FuncId>,
    pub c_f: FuncId,
    pub d_f: FuncId,
    pub c_ty: TypeId,
    pub d_ty: TypeId,
}

/// Two main packages m1 and m2; interface `I { F() }` with
/// implementations `C.F` and `D.F`; m1 boxes only C, m2 boxes only D.
/// When `instanced` the helper is a generic with one instance per caller,
/// otherwise both mains share a single helper.
pub fn iface_program(instanced: bool) -> IfaceProgram {
    let mut b = ProgramBuilder::new();
    let lib = b.add_package("lib", "lib");
    let m1 = b.add_package("main", "m1");
    let m2 = b.add_package("main", "m2");

    let empty_struct = b.types_mut().intern(TypeKind::Struct { fields: vec![] });
    let c_ty = named(&mut b, lib, "C", empty_struct);
    let d_ty = named(&mut b, lib, "D", empty_struct);
    let method_sig = void_sig(&mut b);
    let iface_shape = b.types_mut().intern(TypeKind::Interface {
        methods: vec![AbstractMethod {
            name: "F".to_string(),
            sig: method_sig,
        }],
    });
    let i_ty = named(&mut b, lib, "I", iface_shape);

    let c_f = add_method_f(&mut b, lib, c_ty);
    let d_f = add_method_f(&mut b, lib, d_ty);

    let call_sig = b.types_mut().intern(TypeKind::Signature(Signature {
        params: vec![i_ty],
        results: vec![],
        recv: None,
        variadic: false,
    }));

    let (call, call_insts, m1_main, m2_main);
    if instanced {
        let origin = b.declare_func(Some(lib), "call", call_sig);
        b.set_type_params(origin, vec!["T".to_string()]);
        let inst1 = add_call_helper(&mut b, lib, "call", call_sig, i_ty, method_sig);
        b.set_instance(inst1, origin, vec![c_ty]);
        let inst2 = add_call_helper(&mut b, lib, "call", call_sig, i_ty, method_sig);
        b.set_instance(inst2, origin, vec![d_ty]);
        m1_main = add_main(&mut b, m1, c_ty, i_ty, inst1, call_sig);
        m2_main = add_main(&mut b, m2, d_ty, i_ty, inst2, call_sig);
        call = origin;
        call_insts = vec![inst1, inst2];
    } else {
        let helper = add_call_helper(&mut b, lib, "call", call_sig, i_ty, method_sig);
        m1_main = add_main(&mut b, m1, c_ty, i_ty, helper, call_sig);
        m2_main = add_main(&mut b, m2, d_ty, i_ty, helper, call_sig);
        call = helper;
        call_insts = vec![];
    }

    IfaceProgram {
        prog: b.finish().expect("fixture program is valid"),
        m1_main,
        m2_main,
        call,
        call_insts,
        c_f,
        d_f,
        c_ty,
        d_ty,
    }
}

pub struct HigherOrderProgram {
    pub prog: Program,
    pub main: FuncId,
    pub f: FuncId,
    pub h: FuncId,
    pub k: FuncId,
}

/// `main` calls `f` directly and dispatches through
/// `var g func() = h; g()`; `k` shares the signature but is never
/// referenced.
pub fn higher_order_program() -> HigherOrderProgram {
    let mut b = ProgramBuilder::new();
    let sig = void_sig(&mut b);
    let psig = b.types_mut().pointer(sig);
    let pkg = b.add_package("main", "main");
    let main = b.declare_func(Some(pkg), "main", sig);
    let f = b.declare_func(Some(pkg), "f", sig);
    let h = b.declare_func(Some(pkg), "h", sig);
    let k = b.declare_func(Some(pkg), "k", sig);

    let f_val = b.func_value(f);
    let h_val = b.func_value(h);
    let mut fb = b.func_builder(main);
    fb.new_block();
    fb.push(InstrKind::Call(CallCommon {
        callee: CallTarget::Value(f_val),
        args: vec![],
        signature: sig,
    }));
    let slot = fb.push_value(InstrKind::Alloc { heap: false }, psig);
    fb.push(InstrKind::Store {
        addr: slot,
        val: h_val,
    });
    let g = fb.push_value(
        InstrKind::UnOp {
            op: UnOpKind::Load,
            x: slot,
            comma_ok: false,
        },
        sig,
    );
    fb.push(InstrKind::Call(CallCommon {
        callee: CallTarget::Value(g),
        args: vec![],
        signature: sig,
    }));
    fb.ret(vec![]);

    for func in [f, h, k] {
        let mut fb = b.func_builder(func);
        fb.new_block();
        fb.ret(vec![]);
    }

    HigherOrderProgram {
        prog: b.finish().expect("fixture program is valid"),
        main,
        f,
        h,
        k,
    }
}

pub struct BoundMethodProgram {
    pub prog: Program,
    pub main: FuncId,
    pub bound: FuncId,
    pub t_m: FuncId,
}

/// `main` calls a bound-method wrapper which calls `T.M`.
pub fn bound_method_program() -> BoundMethodProgram {
    let mut b = ProgramBuilder::new();
    let vs = void_sig(&mut b);
    let pkg = b.add_package("main", "main");

    let empty_struct = b.types_mut().intern(TypeKind::Struct { fields: vec![] });
    let t_ty = named(&mut b, pkg, "T", empty_struct);
    let m_sig = b.types_mut().intern(TypeKind::Signature(Signature {
        params: vec![],
        results: vec![],
        recv: Some(t_ty),
        variadic: false,
    }));
    let t_m = b.declare_func(Some(pkg), "M", m_sig);
    b.types_mut().add_method(t_ty, "M", t_m);
    {
        let mut fb = b.func_builder(t_m);
        fb.new_block();
        fb.add_param("recv", t_ty);
        fb.ret(vec![]);
    }

    let bound = b.declare_func(None, "T.M$bound", vs);
    b.set_synthetic(bound, Synthetic::Bound);
    let t_m_val = b.func_value(t_m);
    {
        let mut fb = b.func_builder(bound);
        fb.new_block();
        fb.push(InstrKind::Call(CallCommon {
            callee: CallTarget::Value(t_m_val),
            args: vec![],
            signature: m_sig,
        }));
        fb.ret(vec![]);
    }

    let main = b.declare_func(Some(pkg), "main", vs);
    let bound_val = b.func_value(bound);
    {
        let mut fb = b.func_builder(main);
        fb.new_block();
        fb.push(InstrKind::Call(CallCommon {
            callee: CallTarget::Value(bound_val),
            args: vec![],
            signature: vs,
        }));
        fb.ret(vec![]);
    }

    BoundMethodProgram {
        prog: b.finish().expect("fixture program is valid"),
        main,
        bound,
        t_m,
    }
}

pub struct RangeOverFuncProgram {
    pub prog: Program,
    pub main: FuncId,
    pub seq: FuncId,
    pub yield_body: FuncId,
    pub visit: FuncId,
}

/// `main` ranges over the iterator function `seq`; the loop body is the
/// synthetic yield function, which calls `visit`.
pub fn range_over_func_program() -> RangeOverFuncProgram {
    let mut b = ProgramBuilder::new();
    let vs = void_sig(&mut b);
    let boolean = b.types_mut().basic(Basic::Bool);
    let tuple_ty = b.types_mut().intern(TypeKind::Tuple {
        elems: vec![boolean],
    });
    let pkg = b.add_package("main", "main");

    let main = b.declare_func(Some(pkg), "main", vs);
    let seq = b.declare_func(Some(pkg), "seq", vs);
    let visit = b.declare_func(Some(pkg), "visit", vs);
    let yield_body = b.declare_func(None, "1", vs);
    b.set_enclosing(yield_body, main);
    b.set_synthetic(yield_body, Synthetic::RangeYield);

    let visit_val = b.func_value(visit);
    {
        let mut fb = b.func_builder(yield_body);
        fb.new_block();
        fb.push(InstrKind::Call(CallCommon {
            callee: CallTarget::Value(visit_val),
            args: vec![],
            signature: vs,
        }));
        fb.ret(vec![]);
    }
    for func in [seq, visit] {
        let mut fb = b.func_builder(func);
        fb.new_block();
        fb.ret(vec![]);
    }

    let seq_val = b.func_value(seq);
    {
        let mut fb = b.func_builder(main);
        fb.new_block();
        let iter = fb.push_value(InstrKind::Range { x: seq_val }, vs);
        fb.push_value(
            InstrKind::Next {
                iter,
                is_string: false,
            },
            tuple_ty,
        );
        fb.ret(vec![]);
    }

    RangeOverFuncProgram {
        prog: b.finish().expect("fixture program is valid"),
        main,
        seq,
        yield_body,
        visit,
    }
}

/// Sorted `caller -> callee` pairs of a graph, for set comparisons.
pub fn sorted_edges(cg: &ssa_callgraph::CallGraph, prog: &Program) -> Vec<String> {
    let mut edges = cg.edge_strings(prog);
    edges.sort();
    edges.dedup();
    edges
}
