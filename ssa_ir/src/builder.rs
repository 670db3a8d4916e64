//! Program construction and the IR contract checks.
//!
//! The builder is the only component that mutates a program. `finish()`
//! validates the contract the analyzers rely on, computes dominator trees
//! and freezes the result; after that the IR is read-only.

use std::collections::HashMap;

use crate::block::BasicBlock;
use crate::error::InvalidIr;
use crate::func::{Function, Synthetic};
use crate::ids::{BlockId, FuncId, PkgId, TypeId, ValueId};
use crate::instr::{CallTarget, InstrKind, Instruction};
use crate::pos::Pos;
use crate::program::{Global, Member, NamedConst, Package, Program};
use crate::types::TypeStore;
use crate::value::{ConstValue, Value, ValueKind};

/// Builds one [`Program`].
#[derive(Debug)]
pub struct ProgramBuilder {
    prog: Program,
    func_values: HashMap<FuncId, ValueId>,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self {
            prog: Program::new(),
            func_values: HashMap::new(),
        }
    }

    pub fn add_file(&mut self, name: impl Into<String>) -> u32 {
        self.prog.push_file(name.into())
    }

    pub fn types_mut(&mut self) -> &mut TypeStore {
        self.prog.types_mut()
    }

    pub fn types(&self) -> &TypeStore {
        self.prog.types()
    }

    pub fn program(&self) -> &Program {
        &self.prog
    }

    /// Add a package. Callers add packages in import-topological order;
    /// the id order is the whole-program traversal order.
    pub fn add_package(&mut self, name: impl Into<String>, path: impl Into<String>) -> PkgId {
        self.prog.push_package(Package {
            name: name.into(),
            path: path.into(),
            members: indexmap::IndexMap::new(),
            init: None,
            ninit: Vec::new(),
            is_test: false,
        })
    }

    pub fn mark_test_package(&mut self, pkg: PkgId) {
        self.prog.package_mut(pkg).is_test = true;
    }

    /// Declare a function. When `pkg` is given the function is registered
    /// as a package member under its name (methods are reachable through
    /// their receiver type instead and pass `None`-or-package as fits).
    pub fn declare_func(
        &mut self,
        pkg: Option<PkgId>,
        name: impl Into<String>,
        signature: TypeId,
    ) -> FuncId {
        let name = name.into();
        let is_method = self
            .prog
            .types()
            .as_signature(signature)
            .is_some_and(|s| s.recv.is_some());
        let id = self.prog.push_func(Function {
            name: name.clone(),
            pkg,
            signature,
            params: Vec::new(),
            free_vars: Vec::new(),
            blocks: Vec::new(),
            enclosing: None,
            synthetic: None,
            type_params: Vec::new(),
            type_args: Vec::new(),
            origin: None,
            pos: Pos::NONE,
        });
        if let Some(p) = pkg {
            if !is_method {
                self.prog
                    .package_mut(p)
                    .members
                    .insert(name, Member::Func(id));
            }
        }
        id
    }

    pub fn set_func_pos(&mut self, func: FuncId, pos: Pos) {
        self.prog.func_mut(func).pos = pos;
    }

    pub fn set_synthetic(&mut self, func: FuncId, kind: Synthetic) {
        self.prog.func_mut(func).synthetic = Some(kind);
    }

    /// Mark `func` as an anonymous function enclosed by `parent`.
    pub fn set_enclosing(&mut self, func: FuncId, parent: FuncId) {
        self.prog.func_mut(func).enclosing = Some(parent);
    }

    pub fn set_type_params(&mut self, func: FuncId, params: Vec<String>) {
        self.prog.func_mut(func).type_params = params;
    }

    /// Mark `func` as the instantiation of `origin` with `type_args`.
    /// Instances share the origin's position but stay distinct objects.
    pub fn set_instance(&mut self, func: FuncId, origin: FuncId, type_args: Vec<TypeId>) {
        let origin_pos = self.prog.func(origin).pos;
        let f = self.prog.func_mut(func);
        f.origin = Some(origin);
        f.type_args = type_args;
        f.pos = origin_pos;
        f.synthetic = Some(Synthetic::Instance);
    }

    /// Register `func` as the package's synthetic initializer.
    pub fn set_package_init(&mut self, pkg: PkgId, func: FuncId) {
        self.prog.func_mut(func).synthetic = Some(Synthetic::Init);
        let p = self.prog.package_mut(pkg);
        p.init = Some(func);
        p.members.insert("init".to_string(), Member::Func(func));
    }

    /// Register `func` as the next numbered `init#k` function of `pkg`.
    pub fn add_ninit(&mut self, pkg: PkgId, func: FuncId) {
        self.prog.func_mut(func).synthetic = Some(Synthetic::Init);
        let p = self.prog.package_mut(pkg);
        let k = p.ninit.len();
        p.ninit.push(func);
        p.members
            .insert(format!("init#{}", k + 1), Member::Func(func));
    }

    /// Declare a package-level variable; returns its address value.
    pub fn add_global(
        &mut self,
        pkg: Option<PkgId>,
        name: impl Into<String>,
        pointee: TypeId,
    ) -> ValueId {
        let name = name.into();
        let ty = self.prog.types_mut().pointer(pointee);
        let gid = self.prog.push_global(Global {
            name: name.clone(),
            pkg,
            ty,
            pos: Pos::NONE,
        });
        let v = self.prog.push_value(Value {
            kind: ValueKind::Global(gid),
            ty,
            name: name.clone(),
            referrers: Vec::new(),
        });
        if let Some(p) = pkg {
            self.prog
                .package_mut(p)
                .members
                .insert(name, Member::Global(gid));
        }
        v
    }

    pub fn add_named_const(
        &mut self,
        pkg: PkgId,
        name: impl Into<String>,
        value: ConstValue,
        ty: TypeId,
    ) {
        let name = name.into();
        self.prog.package_mut(pkg).members.insert(
            name.clone(),
            Member::Const(NamedConst { name, value, ty }),
        );
    }

    /// Register a named type as a package member.
    pub fn add_type_member(&mut self, pkg: PkgId, ty: TypeId) {
        let name = self
            .prog
            .types()
            .as_named(ty)
            .map(|n| n.name.clone())
            .unwrap_or_default();
        self.prog
            .package_mut(pkg)
            .members
            .insert(name, Member::Type(ty));
    }

    /// A constant operand value.
    pub fn const_value(&mut self, value: ConstValue, ty: TypeId) -> ValueId {
        let name = match &value {
            ConstValue::Bool(b) => b.to_string(),
            ConstValue::Int(i) => i.to_string(),
            ConstValue::Uint(u) => u.to_string(),
            ConstValue::Float(f) => f.to_string(),
            ConstValue::Str(s) => format!("{:?}", s),
            ConstValue::Nil => "nil".to_string(),
        };
        self.prog.push_value(Value {
            kind: ValueKind::Const(value),
            ty,
            name,
            referrers: Vec::new(),
        })
    }

    /// The function-symbol value for `func`. One value per function.
    pub fn func_value(&mut self, func: FuncId) -> ValueId {
        if let Some(&v) = self.func_values.get(&func) {
            return v;
        }
        let f = self.prog.func(func);
        let (ty, name) = (f.signature, f.name.clone());
        let v = self.prog.push_value(Value {
            kind: ValueKind::Function(func),
            ty,
            name,
            referrers: Vec::new(),
        });
        self.func_values.insert(func, v);
        v
    }

    pub fn builtin_value(&mut self, name: impl Into<String>, ty: TypeId) -> ValueId {
        let name = name.into();
        self.prog.push_value(Value {
            kind: ValueKind::Builtin(name.clone()),
            ty,
            name,
            referrers: Vec::new(),
        })
    }

    /// Start (or resume) building the body of `func`.
    pub fn func_builder(&mut self, func: FuncId) -> FunctionBuilder<'_> {
        FunctionBuilder {
            b: self,
            func,
            cur: None,
        }
    }

    /// Renaming pass: rewrite every operand slot in `func` that holds
    /// `from` to hold `to`, keeping referrer lists exactly inverse to the
    /// operand relation.
    pub fn replace_value(&mut self, func: FuncId, from: ValueId, to: ValueId) {
        if from == to {
            return;
        }
        let instrs: Vec<_> = self.prog.func_instrs(func).collect();
        for id in instrs {
            let mut replaced = 0usize;
            for slot in self.prog.instr_mut(id).operands_mut() {
                if *slot == from {
                    *slot = to;
                    replaced += 1;
                }
            }
            if replaced > 0 {
                let refs = &mut self.prog.value_mut(from).referrers;
                for _ in 0..replaced {
                    if let Some(i) = refs.iter().position(|r| *r == id) {
                        refs.remove(i);
                    }
                }
                let to_refs = &mut self.prog.value_mut(to).referrers;
                for _ in 0..replaced {
                    to_refs.push(id);
                }
            }
        }
    }

    /// Validate the IR contract, compute dominator trees, sort method
    /// tables, and freeze the program.
    pub fn finish(mut self) -> Result<Program, InvalidIr> {
        self.prog.types_mut().sort_methods();

        // Make sure the pointer form of every named type exists, so the
        // analyzers never have to extend the (frozen) type store.
        let named: Vec<TypeId> = self
            .prog
            .types()
            .ids()
            .filter(|id| self.prog.types().as_named(*id).is_some())
            .collect();
        for id in named {
            self.prog.types_mut().pointer(id);
        }

        validate(&self.prog)?;

        let defined: Vec<FuncId> = self
            .prog
            .all_functions()
            .filter(|f| self.prog.func(*f).is_defined())
            .collect();
        for f in defined {
            crate::dom::compute_dominators(&mut self.prog, f);
        }
        Ok(self.prog)
    }
}

/// Builds the body of one function.
#[derive(Debug)]
pub struct FunctionBuilder<'a> {
    b: &'a mut ProgramBuilder,
    func: FuncId,
    cur: Option<BlockId>,
}

impl FunctionBuilder<'_> {
    pub fn func_id(&self) -> FuncId {
        self.func
    }

    pub fn program(&self) -> &Program {
        &self.b.prog
    }

    /// Add the next parameter. For methods, add the receiver first.
    pub fn add_param(&mut self, name: impl Into<String>, ty: TypeId) -> ValueId {
        let index = self.b.prog.func(self.func).params.len() as u32;
        let v = self.b.prog.push_value(Value {
            kind: ValueKind::Param {
                func: self.func,
                index,
            },
            ty,
            name: name.into(),
            referrers: Vec::new(),
        });
        self.b.prog.func_mut(self.func).params.push(v);
        v
    }

    pub fn add_free_var(&mut self, name: impl Into<String>, ty: TypeId) -> ValueId {
        let index = self.b.prog.func(self.func).free_vars.len() as u32;
        let v = self.b.prog.push_value(Value {
            kind: ValueKind::FreeVar {
                func: self.func,
                index,
            },
            ty,
            name: name.into(),
            referrers: Vec::new(),
        });
        self.b.prog.func_mut(self.func).free_vars.push(v);
        v
    }

    /// Append a new block; the first block is the entry and becomes
    /// current automatically.
    pub fn new_block(&mut self) -> BlockId {
        let index = self.b.prog.func(self.func).blocks.len() as u32;
        let id = self.b.prog.push_block(BasicBlock {
            index,
            func: self.func,
            instrs: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            idom: None,
        });
        self.b.prog.func_mut(self.func).blocks.push(id);
        if self.cur.is_none() {
            self.cur = Some(id);
        }
        id
    }

    pub fn select_block(&mut self, block: BlockId) {
        self.cur = Some(block);
    }

    fn cur_block(&self) -> BlockId {
        self.cur.expect("no current block; call new_block first")
    }

    fn push_raw(&mut self, kind: InstrKind, pos: Pos) -> crate::ids::InstrId {
        let block = self.cur_block();
        let instr = Instruction {
            kind,
            block,
            func: self.func,
            pos,
            result: None,
        };
        let operands = instr.operands();
        let id = self.b.prog.push_instr(instr);
        self.b.prog.block_mut(block).instrs.push(id);
        for op in operands {
            self.b.prog.value_mut(op).referrers.push(id);
        }
        id
    }

    /// Push an effect-only instruction.
    pub fn push(&mut self, kind: InstrKind) -> crate::ids::InstrId {
        self.push_raw(kind, Pos::NONE)
    }

    pub fn push_at(&mut self, kind: InstrKind, pos: Pos) -> crate::ids::InstrId {
        self.push_raw(kind, pos)
    }

    /// Push a value-producing instruction and return its result register.
    pub fn push_value(&mut self, kind: InstrKind, ty: TypeId) -> ValueId {
        self.push_value_at(kind, ty, Pos::NONE)
    }

    pub fn push_value_at(&mut self, kind: InstrKind, ty: TypeId, pos: Pos) -> ValueId {
        let id = self.push_raw(kind, pos);
        let v = self.b.prog.push_value(Value {
            kind: ValueKind::Register { instr: id },
            ty,
            name: String::new(),
            referrers: Vec::new(),
        });
        self.b.prog.value_mut(v).name = format!("t{}", v.0);
        self.b.prog.instr_mut(id).result = Some(v);
        v
    }

    fn connect(&mut self, from: BlockId, to: BlockId) {
        self.b.prog.block_mut(from).succs.push(to);
        self.b.prog.block_mut(to).preds.push(from);
    }

    /// Terminate the current block with an unconditional jump.
    pub fn jump(&mut self, to: BlockId) {
        let from = self.cur_block();
        self.push(InstrKind::Jump);
        self.connect(from, to);
    }

    /// Terminate the current block with a two-way branch.
    pub fn branch(&mut self, cond: ValueId, then_block: BlockId, else_block: BlockId) {
        let from = self.cur_block();
        self.push(InstrKind::If { cond });
        self.connect(from, then_block);
        self.connect(from, else_block);
    }

    pub fn ret(&mut self, results: Vec<ValueId>) {
        self.push(InstrKind::Return { results });
    }

    pub fn ret_at(&mut self, results: Vec<ValueId>, pos: Pos) {
        self.push_at(InstrKind::Return { results }, pos);
    }

    pub fn panic(&mut self, x: ValueId) {
        self.push(InstrKind::Panic { x });
    }
}

/// Check every invariant of the IR contract. Also run on programs
/// deserialized from external builders.
pub fn validate(prog: &Program) -> Result<(), InvalidIr> {
    let mut instr_homes: HashMap<crate::ids::InstrId, u32> = HashMap::new();

    for fid in prog.all_functions() {
        let f = prog.func(fid);
        for (bi, &bid) in f.blocks.iter().enumerate() {
            let block = prog.block(bid);
            if block.func != fid {
                return Err(InvalidIr::new(format!(
                    "block {} does not belong to function {}",
                    bid,
                    prog.qualified_name(fid)
                )));
            }
            if block.index as usize != bi {
                return Err(InvalidIr::new(format!("block {} has wrong index", bid)));
            }
            if block.instrs.is_empty() {
                return Err(InvalidIr::new(format!(
                    "empty block {} in {}",
                    bid,
                    prog.qualified_name(fid)
                )));
            }
            for (ii, &iid) in block.instrs.iter().enumerate() {
                *instr_homes.entry(iid).or_insert(0) += 1;
                let instr = prog.instr(iid);
                if instr.block != bid || instr.func != fid {
                    return Err(InvalidIr::new(format!(
                        "instruction {} has inconsistent parent links",
                        iid
                    )));
                }
                let last = ii + 1 == block.instrs.len();
                if last != instr.kind.is_terminator() {
                    return Err(InvalidIr::new(format!(
                        "block {} of {}: terminator placement is wrong",
                        bid,
                        prog.qualified_name(fid)
                    )));
                }
                if let Some(r) = instr.result {
                    let ok = matches!(
                        prog.value(r).kind,
                        ValueKind::Register { instr } if instr == iid
                    );
                    if !ok {
                        return Err(InvalidIr::new(format!(
                            "instruction {} result register is not its own",
                            iid
                        )));
                    }
                }
                validate_call(prog, iid)?;
            }
            // At most one CFG edge between any pair of blocks, and the
            // successor count must match the terminator.
            let mut succs = block.succs.clone();
            succs.sort();
            let before = succs.len();
            succs.dedup();
            if succs.len() != before {
                return Err(InvalidIr::new(format!(
                    "duplicate CFG edge out of block {}",
                    bid
                )));
            }
            let want = match prog.instr(*block.instrs.last().expect("checked non-empty")).kind {
                InstrKind::Jump => 1,
                InstrKind::If { .. } => 2,
                _ => 0,
            };
            if block.succs.len() != want {
                return Err(InvalidIr::new(format!(
                    "block {} has {} successors, terminator wants {}",
                    bid,
                    block.succs.len(),
                    want
                )));
            }
            for &s in &block.succs {
                if !prog.block(s).preds.contains(&bid) {
                    return Err(InvalidIr::new(format!(
                        "missing predecessor link {} -> {}",
                        bid, s
                    )));
                }
            }
        }
        for (i, &p) in f.params.iter().enumerate() {
            let ok = matches!(
                prog.value(p).kind,
                ValueKind::Param { func, index } if func == fid && index as usize == i
            );
            if !ok {
                return Err(InvalidIr::new(format!(
                    "parameter {} of {} is inconsistent",
                    i,
                    prog.qualified_name(fid)
                )));
            }
        }
    }

    for (iid, count) in &instr_homes {
        if *count != 1 {
            return Err(InvalidIr::new(format!(
                "instruction {} appears in {} blocks",
                iid, count
            )));
        }
    }

    // Inverse-relation invariant: each value's referrer list is exactly
    // the multiset of instructions holding it as an operand.
    let mut expected: HashMap<ValueId, Vec<crate::ids::InstrId>> = HashMap::new();
    for iid in prog.instr_ids() {
        if instr_homes.contains_key(&iid) {
            for op in prog.instr(iid).operands() {
                expected.entry(op).or_default().push(iid);
            }
        }
    }
    for vid in prog.value_ids() {
        let mut want = expected.remove(&vid).unwrap_or_default();
        let mut got: Vec<_> = prog.value(vid).referrers().to_vec();
        want.sort();
        got.sort();
        if want != got {
            return Err(InvalidIr::new(format!(
                "value {} referrers are out of sync with operands",
                vid
            )));
        }
    }

    Ok(())
}

fn validate_call(prog: &Program, iid: crate::ids::InstrId) -> Result<(), InvalidIr> {
    let instr = prog.instr(iid);
    let Some(common) = instr.call_common() else {
        return Ok(());
    };
    match &common.callee {
        CallTarget::Invoke { recv, method } => {
            if method.is_empty() {
                return Err(InvalidIr::new(format!(
                    "invoke at instruction {} has no method name",
                    iid
                )));
            }
            let recv_ty = prog.value(*recv).ty;
            if !prog.types().is_interface(recv_ty) {
                return Err(InvalidIr::new(format!(
                    "invoke at instruction {} has non-interface receiver",
                    iid
                )));
            }
        }
        CallTarget::Value(v) => {
            let ty = prog.value(*v).ty;
            let callable = prog.types().as_signature(ty).is_some()
                || matches!(prog.value(*v).kind, ValueKind::Builtin(_));
            if !callable {
                return Err(InvalidIr::new(format!(
                    "call at instruction {} has neither a callable value nor an invoke receiver",
                    iid
                )));
            }
        }
    }
    Ok(())
}
