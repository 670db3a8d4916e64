//! The type model consumed by the analyzers.
//!
//! Structural types (pointers, slices, maps, signatures, ...) are interned:
//! two structurally identical types share one [`TypeId`], so structural
//! equality is id equality. Named types have identity by declaration and are
//! never interned; an instantiation of a generic named type is canonicalized
//! through [`TypeStore::instance_of`] so textually different but semantically
//! identical instantiations share a single id.

mod method_set;

pub use method_set::{compute_method_set, MethodSet};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{FuncId, PkgId, TypeId};

/// Predeclared scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Basic {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    String,
    UnsafePointer,
}

impl Basic {
    pub fn name(self) -> &'static str {
        match self {
            Basic::Bool => "bool",
            Basic::Int => "int",
            Basic::Int8 => "int8",
            Basic::Int16 => "int16",
            Basic::Int32 => "int32",
            Basic::Int64 => "int64",
            Basic::Uint => "uint",
            Basic::Uint8 => "uint8",
            Basic::Uint16 => "uint16",
            Basic::Uint32 => "uint32",
            Basic::Uint64 => "uint64",
            Basic::Uintptr => "uintptr",
            Basic::Float32 => "float32",
            Basic::Float64 => "float64",
            Basic::String => "string",
            Basic::UnsafePointer => "unsafe.Pointer",
        }
    }
}

/// A function signature. The receiver, if any, is not part of structural
/// identity for call-site matching; see [`SigKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<TypeId>,
    pub results: Vec<TypeId>,
    #[serde(default)]
    pub recv: Option<TypeId>,
    #[serde(default)]
    pub variadic: bool,
}

/// A struct field. `embedded` fields participate in method promotion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub ty: TypeId,
    #[serde(default)]
    pub embedded: bool,
}

/// An abstract method of an interface: name plus signature type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbstractMethod {
    pub name: String,
    pub sig: TypeId,
}

/// A declared named type. Identity is by declaration, not structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Named {
    pub name: String,
    pub pkg: Option<PkgId>,
    pub underlying: TypeId,
    /// Declared methods, sorted by name when the program is frozen.
    #[serde(default)]
    pub methods: Vec<(String, FuncId)>,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub type_args: Vec<TypeId>,
    /// The generic named type this one was instantiated from.
    #[serde(default)]
    pub origin: Option<TypeId>,
}

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChanDir {
    SendRecv,
    SendOnly,
    RecvOnly,
}

/// The closed sum of type shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Basic(Basic),
    Pointer { elem: TypeId },
    Slice { elem: TypeId },
    Array { elem: TypeId, len: u64 },
    Map { key: TypeId, value: TypeId },
    Chan { elem: TypeId, dir: ChanDir },
    Tuple { elems: Vec<TypeId> },
    Signature(Signature),
    Struct { fields: Vec<StructField> },
    /// Methods are kept sorted by name; satisfaction is set inclusion.
    Interface { methods: Vec<AbstractMethod> },
    Named(Box<Named>),
    TypeParam { name: String, index: u32 },
}

/// Receiver-stripped structural key of a signature, used to match
/// higher-order call sites against candidate functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SigKey {
    pub params: Vec<TypeId>,
    pub results: Vec<TypeId>,
    pub variadic: bool,
}

/// Arena of types owned by one program.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TypeStore {
    kinds: Vec<TypeKind>,
    /// Canonical instantiations of generic named types,
    /// keyed by (origin, type arguments).
    #[serde(default)]
    instances: Vec<((TypeId, Vec<TypeId>), TypeId)>,
    #[serde(skip)]
    interned: HashMap<TypeKind, TypeId>,
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// All type ids, in id order.
    pub fn ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.kinds.len() as u32).map(TypeId)
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.index()]
    }

    /// Intern a structural type. Named types must go through
    /// [`TypeStore::declare_named`].
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        debug_assert!(
            !matches!(kind, TypeKind::Named(_)),
            "named types have declaration identity and are not interned"
        );
        if let Some(&id) = self.interned.get(&kind) {
            return id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.interned.insert(kind.clone(), id);
        self.kinds.push(kind);
        id
    }

    pub fn basic(&mut self, b: Basic) -> TypeId {
        self.intern(TypeKind::Basic(b))
    }

    pub fn pointer(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer { elem })
    }

    /// Declare a fresh named type. Never deduplicated.
    pub fn declare_named(&mut self, named: Named) -> TypeId {
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(TypeKind::Named(Box::new(named)));
        id
    }

    /// Record `instance` as the canonical instantiation of `origin` with
    /// `args`. Returns the previously recorded instance if one exists, so
    /// builders converge on a single id per instantiation.
    pub fn instance_of(&mut self, origin: TypeId, args: Vec<TypeId>, instance: TypeId) -> TypeId {
        let key = (origin, args);
        if let Some((_, existing)) = self.instances.iter().find(|(k, _)| *k == key) {
            return *existing;
        }
        self.instances.push((key, instance));
        instance
    }

    /// Look up the canonical instantiation of `origin` with `args`.
    pub fn find_instance(&self, origin: TypeId, args: &[TypeId]) -> Option<TypeId> {
        self.instances
            .iter()
            .find(|((o, a), _)| *o == origin && a == args)
            .map(|(_, id)| *id)
    }

    /// Append a declared method to a named type. Build-time only.
    pub fn add_method(&mut self, named: TypeId, name: impl Into<String>, func: FuncId) {
        match &mut self.kinds[named.index()] {
            TypeKind::Named(n) => n.methods.push((name.into(), func)),
            other => panic!("add_method on non-named type {:?}", other),
        }
    }

    /// Resolve a named-type chain down to its structural underlying type.
    pub fn underlying(&self, id: TypeId) -> TypeId {
        let mut cur = id;
        // Underlying chains are acyclic by construction; bound the walk anyway.
        for _ in 0..self.kinds.len() + 1 {
            match self.kind(cur) {
                TypeKind::Named(n) => cur = n.underlying,
                _ => return cur,
            }
        }
        cur
    }

    pub fn as_named(&self, id: TypeId) -> Option<&Named> {
        match self.kind(id) {
            TypeKind::Named(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        matches!(self.kind(self.underlying(id)), TypeKind::Interface { .. })
    }

    /// A concrete type can be boxed into an interface: anything that is not
    /// an interface or a bare type parameter.
    pub fn is_concrete(&self, id: TypeId) -> bool {
        !self.is_interface(id) && !matches!(self.kind(self.underlying(id)), TypeKind::TypeParam { .. })
    }

    pub fn as_signature(&self, id: TypeId) -> Option<&Signature> {
        match self.kind(self.underlying(id)) {
            TypeKind::Signature(sig) => Some(sig),
            _ => None,
        }
    }

    /// Receiver-stripped key of a signature type, or None for non-signatures.
    pub fn sig_key(&self, id: TypeId) -> Option<SigKey> {
        self.as_signature(id).map(|sig| SigKey {
            params: sig.params.clone(),
            results: sig.results.clone(),
            variadic: sig.variadic,
        })
    }

    /// The abstract methods of an interface type (after resolving names),
    /// or None if `id` is not an interface.
    pub fn interface_methods(&self, id: TypeId) -> Option<&[AbstractMethod]> {
        match self.kind(self.underlying(id)) {
            TypeKind::Interface { methods } => Some(methods),
            _ => None,
        }
    }

    /// Does `id` structurally refer to a type parameter anywhere?
    /// Memoized at the program level; this is the uncached walk.
    pub(crate) fn refers_to_params(&self, id: TypeId, visiting: &mut Vec<TypeId>) -> bool {
        if visiting.contains(&id) {
            return false;
        }
        visiting.push(id);
        let hit = match self.kind(id) {
            TypeKind::Basic(_) => false,
            TypeKind::TypeParam { .. } => true,
            TypeKind::Pointer { elem }
            | TypeKind::Slice { elem }
            | TypeKind::Array { elem, .. }
            | TypeKind::Chan { elem, .. } => self.refers_to_params(*elem, visiting),
            TypeKind::Map { key, value } => {
                self.refers_to_params(*key, visiting) || self.refers_to_params(*value, visiting)
            }
            TypeKind::Tuple { elems } => {
                elems.iter().any(|e| self.refers_to_params(*e, visiting))
            }
            TypeKind::Signature(sig) => {
                sig.params.iter().any(|p| self.refers_to_params(*p, visiting))
                    || sig.results.iter().any(|r| self.refers_to_params(*r, visiting))
            }
            TypeKind::Struct { fields } => {
                fields.iter().any(|f| self.refers_to_params(f.ty, visiting))
            }
            TypeKind::Interface { methods } => {
                methods.iter().any(|m| self.refers_to_params(m.sig, visiting))
            }
            TypeKind::Named(n) => {
                (!n.type_params.is_empty() && n.type_args.is_empty())
                    || n.type_args.iter().any(|a| self.refers_to_params(*a, visiting))
            }
        };
        visiting.pop();
        hit
    }

    /// Rebuild the interning table after deserialization. The frozen store
    /// is read-only, so this only has to make `intern` idempotent again for
    /// builders resuming from serialized programs.
    pub(crate) fn rehash(&mut self) {
        self.interned.clear();
        for (i, kind) in self.kinds.iter().enumerate() {
            if !matches!(kind, TypeKind::Named(_)) {
                self.interned.entry(kind.clone()).or_insert(TypeId(i as u32));
            }
        }
    }

    /// Sort every named type's declared methods by name. Called on freeze.
    pub(crate) fn sort_methods(&mut self) {
        for kind in &mut self.kinds {
            match kind {
                TypeKind::Named(n) => n.methods.sort_by(|a, b| a.0.cmp(&b.0)),
                TypeKind::Interface { methods } => methods.sort_by(|a, b| a.name.cmp(&b.name)),
                _ => {}
            }
        }
    }
}
