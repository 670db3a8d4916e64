//! Integration tests for the IR: the builder contract, the renaming pass,
//! dominators, and program serialization.

use pretty_assertions::assert_eq;
use ssa_ir::builder::ProgramBuilder;
use ssa_ir::types::{AbstractMethod, Basic, Named, Signature, TypeKind};
use ssa_ir::{
    BinOpKind, CallCommon, CallTarget, ConstValue, InstrKind, Program, TypeId, UnOpKind,
};

fn void_sig(b: &mut ProgramBuilder) -> TypeId {
    b.types_mut().intern(TypeKind::Signature(Signature {
        params: vec![],
        results: vec![],
        recv: None,
        variadic: false,
    }))
}

#[test]
fn test_invoke_on_non_interface_is_invalid_ir() {
    let mut b = ProgramBuilder::new();
    let sig = void_sig(&mut b);
    let int = b.types_mut().basic(Basic::Int);
    let pkg = b.add_package("main", "main");
    let f = b.declare_func(Some(pkg), "f", sig);
    let x = b.const_value(ConstValue::Int(1), int);
    let mut fb = b.func_builder(f);
    fb.new_block();
    fb.push(InstrKind::Call(CallCommon {
        callee: CallTarget::Invoke {
            recv: x,
            method: "M".to_string(),
        },
        args: vec![],
        signature: sig,
    }));
    fb.ret(vec![]);

    let err = b.finish().unwrap_err();
    assert!(err.reason.contains("non-interface receiver"), "{}", err);
}

#[test]
fn test_terminator_placement_is_enforced() {
    let mut b = ProgramBuilder::new();
    let sig = void_sig(&mut b);
    let pkg = b.add_package("main", "main");
    let f = b.declare_func(Some(pkg), "f", sig);
    let mut fb = b.func_builder(f);
    fb.new_block();
    // Block left without a terminator.
    fb.push(InstrKind::Alloc { heap: false });

    let err = b.finish().unwrap_err();
    assert!(err.reason.contains("terminator"), "{}", err);
}

#[test]
fn test_replace_value_keeps_referrers_inverse() {
    let mut b = ProgramBuilder::new();
    let sig = void_sig(&mut b);
    let int = b.types_mut().basic(Basic::Int);
    let pkg = b.add_package("main", "main");
    let f = b.declare_func(Some(pkg), "f", sig);
    let one = b.const_value(ConstValue::Int(1), int);
    let two = b.const_value(ConstValue::Int(2), int);
    let mut fb = b.func_builder(f);
    fb.new_block();
    let sum = fb.push_value(
        InstrKind::BinOp {
            op: BinOpKind::Add,
            x: one,
            y: one,
        },
        int,
    );
    fb.push(InstrKind::UnOp {
        op: UnOpKind::Neg,
        x: sum,
        comma_ok: false,
    });
    fb.ret(vec![]);

    // Rename both uses of `one` to `two`; validation in finish() checks
    // the operand/referrer inverse, so a desynced rename would fail.
    b.replace_value(f, one, two);
    let prog = b.finish().unwrap();

    assert!(prog.value(one).referrers().is_empty());
    assert_eq!(prog.value(two).referrers().len(), 2);
}

#[test]
fn test_dominators_on_a_diamond() {
    let mut b = ProgramBuilder::new();
    let sig = void_sig(&mut b);
    let boolean = b.types_mut().basic(Basic::Bool);
    let pkg = b.add_package("main", "main");
    let f = b.declare_func(Some(pkg), "f", sig);
    let cond = b.const_value(ConstValue::Bool(true), boolean);

    let mut fb = b.func_builder(f);
    let entry = fb.new_block();
    let left = fb.new_block();
    let right = fb.new_block();
    let join = fb.new_block();

    fb.select_block(entry);
    fb.branch(cond, left, right);
    fb.select_block(left);
    fb.jump(join);
    fb.select_block(right);
    fb.jump(join);
    fb.select_block(join);
    fb.ret(vec![]);

    let prog = b.finish().unwrap();
    assert_eq!(prog.block(entry).idom, None);
    assert_eq!(prog.block(left).idom, Some(entry));
    assert_eq!(prog.block(right).idom, Some(entry));
    // Neither branch dominates the join; only the entry does.
    assert_eq!(prog.block(join).idom, Some(entry));
    assert!(ssa_ir::dom::dominates(&prog, entry, join));
    assert!(!ssa_ir::dom::dominates(&prog, left, join));
}

#[test]
fn test_traversal_follows_declaration_order() {
    let mut b = ProgramBuilder::new();
    let sig = void_sig(&mut b);
    let lib = b.add_package("lib", "lib");
    let main = b.add_package("main", "main");
    let lf = b.declare_func(Some(lib), "Helper", sig);
    let mf = b.declare_func(Some(main), "main", sig);
    let anon = b.declare_func(None, "1", sig);
    b.set_enclosing(anon, mf);
    let prog = b.finish().unwrap();

    let order: Vec<String> = prog
        .all_functions()
        .map(|f| prog.qualified_name(f))
        .collect();
    assert_eq!(order, vec!["lib.Helper", "main.main", "main.main$1"]);
}

#[test]
fn test_json_round_trip_preserves_program() {
    let mut b = ProgramBuilder::new();
    let sig = void_sig(&mut b);
    let pkg = b.add_package("main", "main");
    let empty_struct = b.types_mut().intern(TypeKind::Struct { fields: vec![] });
    let t_ty = b.types_mut().declare_named(Named {
        name: "T".to_string(),
        pkg: Some(pkg),
        underlying: empty_struct,
        methods: vec![],
        type_params: vec![],
        type_args: vec![],
        origin: None,
    });
    let m_sig = b.types_mut().intern(TypeKind::Signature(Signature {
        params: vec![],
        results: vec![],
        recv: Some(t_ty),
        variadic: false,
    }));
    let m = b.declare_func(Some(pkg), "M", m_sig);
    b.types_mut().add_method(t_ty, "M", m);
    {
        let mut fb = b.func_builder(m);
        fb.new_block();
        fb.add_param("recv", t_ty);
        fb.ret(vec![]);
    }
    let main = b.declare_func(Some(pkg), "main", sig);
    {
        let mut fb = b.func_builder(main);
        fb.new_block();
        fb.ret(vec![]);
    }
    let prog = b.finish().unwrap();

    let round = Program::from_json(&prog.to_json()).unwrap();
    assert_eq!(round.func_count(), prog.func_count());
    assert_eq!(round.qualified_name(m), "(main.T).M");
    assert_eq!(round.lookup_method(t_ty, "M"), Some(m));
}

#[test]
fn test_from_json_rejects_garbage() {
    assert!(Program::from_json("not json").is_err());
}

#[test]
fn test_implements_and_make_interface_types() {
    let mut b = ProgramBuilder::new();
    let method_sig = void_sig(&mut b);
    let pkg = b.add_package("main", "main");
    let empty_struct = b.types_mut().intern(TypeKind::Struct { fields: vec![] });
    let t_ty = b.types_mut().declare_named(Named {
        name: "T".to_string(),
        pkg: Some(pkg),
        underlying: empty_struct,
        methods: vec![],
        type_params: vec![],
        type_args: vec![],
        origin: None,
    });
    let iface = b.types_mut().intern(TypeKind::Interface {
        methods: vec![AbstractMethod {
            name: "M".to_string(),
            sig: method_sig,
        }],
    });
    let m_sig = b.types_mut().intern(TypeKind::Signature(Signature {
        params: vec![],
        results: vec![],
        recv: Some(t_ty),
        variadic: false,
    }));
    let m = b.declare_func(Some(pkg), "M", m_sig);
    b.types_mut().add_method(t_ty, "M", m);
    {
        let mut fb = b.func_builder(m);
        fb.new_block();
        fb.add_param("recv", t_ty);
        fb.ret(vec![]);
    }

    let f = b.declare_func(Some(pkg), "f", method_sig);
    let pt = b.types_mut().pointer(t_ty);
    {
        let mut fb = b.func_builder(f);
        fb.new_block();
        let slot = fb.push_value(InstrKind::Alloc { heap: false }, pt);
        let v = fb.push_value(
            InstrKind::UnOp {
                op: UnOpKind::Load,
                x: slot,
                comma_ok: false,
            },
            t_ty,
        );
        fb.push_value(InstrKind::MakeInterface { x: v }, iface);
        fb.ret(vec![]);
    }
    let prog = b.finish().unwrap();

    assert!(prog.implements(t_ty, iface));
    assert!(!prog.implements(iface, iface));
    let boxed = prog.make_interface_types();
    assert!(boxed.contains(&t_ty));
    assert_eq!(boxed.len(), 1);
}
