//! The program: exclusive owner of every package, function, value,
//! instruction, block, global and type, plus the position database and the
//! shared memoization caches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::block::BasicBlock;
use crate::error::InvalidIr;
use crate::func::Function;
use crate::ids::{BlockId, FuncId, GlobalId, InstrId, PkgId, TypeId, ValueId};
use crate::instr::{InstrKind, Instruction};
use crate::pos::{Pos, Position};
use crate::types::{compute_method_set, MethodSet, TypeKind, TypeStore};
use crate::value::{ConstValue, Value};

/// A package-level member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    Const(NamedConst),
    Global(GlobalId),
    Func(FuncId),
    Type(TypeId),
}

/// A package-level named constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedConst {
    pub name: String,
    pub value: ConstValue,
    pub ty: TypeId,
}

/// A package-level variable. The member value is the variable's address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    pub pkg: Option<PkgId>,
    /// Pointer type; the pointee is the variable's declared type.
    pub ty: TypeId,
    #[serde(default)]
    pub pos: Pos,
}

/// An analyzed package. Packages are stored in import-topological order
/// with stable ties, which fixes the whole-program traversal order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub path: String,
    /// Members keyed by declared name, in declaration order.
    pub members: IndexMap<String, Member>,
    /// The synthetic package initializer.
    #[serde(default)]
    pub init: Option<FuncId>,
    /// Numbered `init#k` functions, in declaration order.
    #[serde(default)]
    pub ninit: Vec<FuncId>,
    /// Set by the loader for packages synthesized from test code.
    #[serde(default)]
    pub is_test: bool,
}

impl Package {
    /// Look up a function member by name.
    pub fn func(&self, name: &str) -> Option<FuncId> {
        match self.members.get(name) {
            Some(Member::Func(f)) => Some(*f),
            _ => None,
        }
    }
}

/// Memoization caches shared between analyses. One lock per cache; a
/// computation never holds two cache locks at the same time. The fill-once
/// whole-program tables use `OnceCell`, which carries its own internal
/// synchronization.
#[derive(Debug, Default)]
pub(crate) struct Caches {
    method_sets: Mutex<HashMap<TypeId, Arc<MethodSet>>>,
    has_params: Mutex<HashMap<TypeId, bool>>,
    make_interface_types: OnceCell<Arc<IndexSet<TypeId>>>,
    func_instances: OnceCell<Arc<HashMap<(FuncId, Vec<TypeId>), FuncId>>>,
}

/// A whole program in SSA form, immutable once built. Analyses may run
/// concurrently over a shared program; every mutable bit of state lives in
/// the per-cache mutexes above.
#[derive(Debug, Serialize, Deserialize)]
pub struct Program {
    files: Vec<String>,
    types: TypeStore,
    packages: Vec<Package>,
    funcs: Vec<Function>,
    values: Vec<Value>,
    instrs: Vec<Instruction>,
    blocks: Vec<BasicBlock>,
    globals: Vec<Global>,
    #[serde(skip)]
    caches: Caches,
}

impl Program {
    pub(crate) fn new() -> Self {
        Self {
            files: Vec::new(),
            types: TypeStore::new(),
            packages: Vec::new(),
            funcs: Vec::new(),
            values: Vec::new(),
            instrs: Vec::new(),
            blocks: Vec::new(),
            globals: Vec::new(),
            caches: Caches::default(),
        }
    }

    // -- arena access -----------------------------------------------------

    pub fn types(&self) -> &TypeStore {
        &self.types
    }

    pub(crate) fn types_mut(&mut self) -> &mut TypeStore {
        &mut self.types
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, id: PkgId) -> &Package {
        &self.packages[id.index()]
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.index()]
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn instr(&self, id: InstrId) -> &Instruction {
        &self.instrs[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    pub fn func_count(&self) -> usize {
        self.funcs.len()
    }

    pub fn contains_func(&self, id: FuncId) -> bool {
        id.index() < self.funcs.len()
    }

    /// Deterministic traversal of every function in the program:
    /// declaration order within each package, anonymous functions beneath
    /// their parents, packages in import-topological order. The builder
    /// assigns function ids in exactly this order, so id order is the
    /// traversal order.
    pub fn all_functions(&self) -> impl Iterator<Item = FuncId> {
        (0..self.funcs.len() as u32).map(FuncId)
    }

    /// Every instruction of a defined function, in block order.
    pub fn func_instrs(&self, func: FuncId) -> impl Iterator<Item = InstrId> + '_ {
        self.funcs[func.index()]
            .blocks
            .iter()
            .flat_map(move |b| self.blocks[b.index()].instrs.iter().copied())
    }

    // -- positions --------------------------------------------------------

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub(crate) fn push_file(&mut self, name: String) -> u32 {
        self.files.push(name);
        (self.files.len() - 1) as u32
    }

    /// Resolve a compact position against the file table.
    pub fn position(&self, pos: Pos) -> Position {
        if pos.is_none() {
            return Position::default();
        }
        Position {
            filename: self
                .files
                .get(pos.file as usize)
                .cloned()
                .unwrap_or_default(),
            offset: pos.offset,
            line: pos.line,
            column: pos.column,
        }
    }

    // -- naming -----------------------------------------------------------

    /// Human-readable type name, package-qualified for named types.
    pub fn type_string(&self, id: TypeId) -> String {
        match self.types.kind(id) {
            TypeKind::Basic(b) => b.name().to_string(),
            TypeKind::Pointer { elem } => format!("*{}", self.type_string(*elem)),
            TypeKind::Slice { elem } => format!("[]{}", self.type_string(*elem)),
            TypeKind::Array { elem, len } => format!("[{}]{}", len, self.type_string(*elem)),
            TypeKind::Map { key, value } => {
                format!("map[{}]{}", self.type_string(*key), self.type_string(*value))
            }
            TypeKind::Chan { elem, .. } => format!("chan {}", self.type_string(*elem)),
            TypeKind::Tuple { elems } => {
                let parts: Vec<String> = elems.iter().map(|e| self.type_string(*e)).collect();
                format!("({})", parts.join(", "))
            }
            TypeKind::Signature(sig) => {
                let params: Vec<String> = sig.params.iter().map(|p| self.type_string(*p)).collect();
                let results: Vec<String> =
                    sig.results.iter().map(|r| self.type_string(*r)).collect();
                match results.len() {
                    0 => format!("func({})", params.join(", ")),
                    1 => format!("func({}) {}", params.join(", "), results[0]),
                    _ => format!("func({}) ({})", params.join(", "), results.join(", ")),
                }
            }
            TypeKind::Struct { .. } => "struct{...}".to_string(),
            TypeKind::Interface { methods } => {
                if methods.is_empty() {
                    "interface{}".to_string()
                } else {
                    "interface{...}".to_string()
                }
            }
            TypeKind::Named(n) => {
                let base = match n.pkg {
                    Some(p) => format!("{}.{}", self.packages[p.index()].path, n.name),
                    None => n.name.clone(),
                };
                if n.type_args.is_empty() {
                    base
                } else {
                    let args: Vec<String> =
                        n.type_args.iter().map(|a| self.type_string(*a)).collect();
                    format!("{}[{}]", base, args.join(", "))
                }
            }
            TypeKind::TypeParam { name, .. } => name.clone(),
        }
    }

    /// Package-qualified function name: `path.Name` for package functions,
    /// `(path.T).M` / `(*path.T).M` for methods, `parent$name` for
    /// anonymous functions.
    pub fn qualified_name(&self, id: FuncId) -> String {
        let f = &self.funcs[id.index()];
        if let Some(parent) = f.enclosing {
            return format!("{}${}", self.qualified_name(parent), f.name);
        }
        if let Some(recv) = self.types.as_signature(f.signature).and_then(|s| s.recv) {
            return format!("({}).{}", self.type_string(recv), f.name);
        }
        match f.pkg {
            Some(p) => format!("{}.{}", self.packages[p.index()].path, f.name),
            None => f.name.clone(),
        }
    }

    // -- memoized queries -------------------------------------------------

    /// The method set of `ty`, in lexical method-name order. Memoized.
    pub fn method_set(&self, ty: TypeId) -> Arc<MethodSet> {
        if let Some(hit) = self
            .caches
            .method_sets
            .lock()
            .expect("method set cache poisoned")
            .get(&ty)
        {
            return Arc::clone(hit);
        }
        // Computed outside the lock: computation touches no other cache,
        // and racing computations converge on identical results.
        let computed = Arc::new(compute_method_set(self, ty));
        let mut cache = self
            .caches
            .method_sets
            .lock()
            .expect("method set cache poisoned");
        Arc::clone(cache.entry(ty).or_insert(computed))
    }

    /// Does concrete type `ty` satisfy interface `iface`? Set inclusion of
    /// the interface's methods in `ty`'s method set, with receiver-stripped
    /// signature comparison.
    pub fn implements(&self, ty: TypeId, iface: TypeId) -> bool {
        let Some(imethods) = self.types.interface_methods(iface) else {
            return false;
        };
        if !self.types.is_concrete(ty) {
            return false;
        }
        if imethods.is_empty() {
            return true;
        }
        let mset = self.method_set(ty);
        imethods.iter().all(|am| match mset.lookup(&am.name) {
            Some(impl_fn) => {
                let impl_sig = self.funcs[impl_fn.index()].signature;
                self.types.sig_key(impl_sig) == self.types.sig_key(am.sig)
            }
            None => false,
        })
    }

    /// The implementation of method `name` on `ty`, if any.
    pub fn lookup_method(&self, ty: TypeId, name: &str) -> Option<FuncId> {
        self.method_set(ty).lookup(name)
    }

    /// Does `ty` structurally refer to any type parameter? Memoized.
    pub fn has_type_params(&self, ty: TypeId) -> bool {
        if let Some(&hit) = self
            .caches
            .has_params
            .lock()
            .expect("has-params cache poisoned")
            .get(&ty)
        {
            return hit;
        }
        let computed = self.types.refers_to_params(ty, &mut Vec::new());
        self.caches
            .has_params
            .lock()
            .expect("has-params cache poisoned")
            .insert(ty, computed);
        computed
    }

    /// The set of concrete types used as make-interface operands anywhere
    /// in the program, in first-occurrence order. Memoized.
    pub fn make_interface_types(&self) -> Arc<IndexSet<TypeId>> {
        let set = self.caches.make_interface_types.get_or_init(|| {
            let mut set = IndexSet::new();
            for instr in &self.instrs {
                if let InstrKind::MakeInterface { x } = instr.kind {
                    set.insert(self.values[x.index()].ty);
                }
            }
            Arc::new(set)
        });
        Arc::clone(set)
    }

    /// Canonical instantiation of generic function `origin` with `args`,
    /// if the program contains one. Memoized; when several instances share
    /// the same (origin, arguments), the lowest id is canonical.
    pub fn func_instance(&self, origin: FuncId, args: &[TypeId]) -> Option<FuncId> {
        let map = self.caches.func_instances.get_or_init(|| {
            let mut map: HashMap<(FuncId, Vec<TypeId>), FuncId> = HashMap::new();
            for (i, f) in self.funcs.iter().enumerate() {
                if let Some(origin) = f.origin {
                    if !f.type_args.is_empty() {
                        map.entry((origin, f.type_args.clone()))
                            .or_insert(FuncId(i as u32));
                    }
                }
            }
            Arc::new(map)
        });
        map.get(&(origin, args.to_vec())).copied()
    }

    // -- serialization ----------------------------------------------------

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("program serialization cannot fail")
    }

    /// Deserialize a program produced by an external SSA builder, restore
    /// the derived tables, and re-check the IR contract.
    pub fn from_json(data: &str) -> Result<Program, InvalidIr> {
        let mut prog: Program =
            serde_json::from_str(data).map_err(|e| InvalidIr::new(format!("malformed program: {e}")))?;
        prog.types.rehash();
        crate::builder::validate(&prog)?;
        Ok(prog)
    }

    // -- build-time mutation (crate-internal) -----------------------------

    pub(crate) fn push_package(&mut self, pkg: Package) -> PkgId {
        self.packages.push(pkg);
        PkgId((self.packages.len() - 1) as u32)
    }

    pub(crate) fn package_mut(&mut self, id: PkgId) -> &mut Package {
        &mut self.packages[id.index()]
    }

    pub(crate) fn push_func(&mut self, f: Function) -> FuncId {
        self.funcs.push(f);
        FuncId((self.funcs.len() - 1) as u32)
    }

    pub(crate) fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.index()]
    }

    pub(crate) fn push_value(&mut self, v: Value) -> ValueId {
        self.values.push(v);
        ValueId((self.values.len() - 1) as u32)
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.index()]
    }

    pub(crate) fn push_instr(&mut self, i: Instruction) -> InstrId {
        self.instrs.push(i);
        InstrId((self.instrs.len() - 1) as u32)
    }

    pub(crate) fn instr_mut(&mut self, id: InstrId) -> &mut Instruction {
        &mut self.instrs[id.index()]
    }

    pub(crate) fn push_block(&mut self, b: BasicBlock) -> BlockId {
        self.blocks.push(b);
        BlockId((self.blocks.len() - 1) as u32)
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub(crate) fn push_global(&mut self, g: Global) -> GlobalId {
        self.globals.push(g);
        GlobalId((self.globals.len() - 1) as u32)
    }

    pub(crate) fn instr_ids(&self) -> impl Iterator<Item = InstrId> {
        (0..self.instrs.len() as u32).map(InstrId)
    }

    pub(crate) fn value_ids(&self) -> impl Iterator<Item = ValueId> {
        (0..self.values.len() as u32).map(ValueId)
    }
}
