//! Method-set enumeration and interface satisfaction.
//!
//! A concrete type's method set contains its declared methods plus methods
//! promoted through embedded struct fields, breadth-first: the shallowest
//! declaration wins and names that are ambiguous at their shallowest depth
//! are dropped. Pointer-receiver methods are only part of the set when the
//! receiver is addressable, i.e. when the query type is a pointer or the
//! method was reached through a pointer embedding.

use std::collections::{BTreeMap, HashSet};

use crate::ids::{FuncId, TypeId};
use crate::program::Program;
use crate::types::TypeKind;

/// An immutable `(method name, implementation)` table in lexical name order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSet {
    methods: Vec<(String, FuncId)>,
}

impl MethodSet {
    pub fn methods(&self) -> &[(String, FuncId)] {
        &self.methods
    }

    pub fn lookup(&self, name: &str) -> Option<FuncId> {
        self.methods
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.methods[i].1)
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }
}

fn has_pointer_receiver(prog: &Program, func: FuncId) -> bool {
    let sig = prog.func(func).signature;
    match prog.types().as_signature(sig).and_then(|s| s.recv) {
        Some(recv) => matches!(prog.types().kind(recv), TypeKind::Pointer { .. }),
        None => false,
    }
}

/// Uncached method-set computation; use [`Program::method_set`] instead,
/// which memoizes the result.
pub fn compute_method_set(prog: &Program, ty: TypeId) -> MethodSet {
    let store = prog.types();

    let (start, start_indirect) = match store.kind(ty) {
        TypeKind::Pointer { elem } => (*elem, true),
        _ => (ty, false),
    };

    let mut collected: BTreeMap<String, FuncId> = BTreeMap::new();
    let mut blocked: HashSet<String> = HashSet::new();
    let mut seen: HashSet<(TypeId, bool)> = HashSet::new();
    let mut frontier: Vec<(TypeId, bool)> = vec![(start, start_indirect)];

    while !frontier.is_empty() {
        // Candidates found at this embedding depth, keyed by method name.
        let mut tier: BTreeMap<String, Vec<FuncId>> = BTreeMap::new();
        let mut next: Vec<(TypeId, bool)> = Vec::new();

        for (t, indirect) in frontier {
            if !seen.insert((t, indirect)) {
                continue;
            }
            if let Some(named) = store.as_named(t) {
                for (name, func) in &named.methods {
                    if collected.contains_key(name) || blocked.contains(name) {
                        continue;
                    }
                    if has_pointer_receiver(prog, *func) && !indirect {
                        continue;
                    }
                    tier.entry(name.clone()).or_default().push(*func);
                }
            }
            let under = store.underlying(t);
            if let TypeKind::Struct { fields } = store.kind(under) {
                for field in fields {
                    if !field.embedded {
                        continue;
                    }
                    match store.kind(field.ty) {
                        TypeKind::Pointer { elem } => next.push((*elem, true)),
                        _ => next.push((field.ty, indirect)),
                    }
                }
            }
        }

        for (name, mut cands) in tier {
            cands.sort();
            cands.dedup();
            if cands.len() == 1 {
                collected.insert(name, cands[0]);
            } else {
                // Ambiguous at its shallowest depth: not in the set.
                blocked.insert(name);
            }
        }

        frontier = next;
    }

    MethodSet {
        methods: collected.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::ProgramBuilder;
    use crate::types::{Basic, Named, Signature, StructField, TypeKind};

    #[test]
    fn test_method_set_lexical_order_and_promotion() {
        let mut b = ProgramBuilder::new();
        let int = b.types_mut().basic(Basic::Int);

        let inner_struct = b.types_mut().intern(TypeKind::Struct { fields: vec![] });
        let inner = b.types_mut().declare_named(Named {
            name: "Inner".to_string(),
            pkg: None,
            underlying: inner_struct,
            methods: vec![],
            type_params: vec![],
            type_args: vec![],
            origin: None,
        });

        let outer_struct = b.types_mut().intern(TypeKind::Struct {
            fields: vec![StructField {
                name: "Inner".to_string(),
                ty: inner,
                embedded: true,
            }],
        });
        let outer = b.types_mut().declare_named(Named {
            name: "Outer".to_string(),
            pkg: None,
            underlying: outer_struct,
            methods: vec![],
            type_params: vec![],
            type_args: vec![],
            origin: None,
        });

        let sig_inner = b.types_mut().intern(TypeKind::Signature(Signature {
            params: vec![],
            results: vec![int],
            recv: Some(inner),
            variadic: false,
        }));
        let sig_outer = b.types_mut().intern(TypeKind::Signature(Signature {
            params: vec![],
            results: vec![int],
            recv: Some(outer),
            variadic: false,
        }));

        let promoted = b.declare_func(None, "Promoted", sig_inner);
        let zed = b.declare_func(None, "Zed", sig_outer);
        let abc = b.declare_func(None, "Abc", sig_outer);
        b.types_mut().add_method(inner, "Promoted", promoted);
        b.types_mut().add_method(outer, "Zed", zed);
        b.types_mut().add_method(outer, "Abc", abc);

        let prog = b.finish().unwrap();
        let mset = prog.method_set(outer);
        let names: Vec<&str> = mset.methods().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Abc", "Promoted", "Zed"]);
        assert_eq!(mset.lookup("Promoted"), Some(promoted));
        assert_eq!(mset.lookup("Missing"), None);
    }

    #[test]
    fn test_pointer_receiver_requires_addressability() {
        let mut b = ProgramBuilder::new();
        let int = b.types_mut().basic(Basic::Int);
        let t = b.types_mut().declare_named(Named {
            name: "T".to_string(),
            pkg: None,
            underlying: int,
            methods: vec![],
            type_params: vec![],
            type_args: vec![],
            origin: None,
        });
        let pt = b.types_mut().pointer(t);

        let sig_val = b.types_mut().intern(TypeKind::Signature(Signature {
            params: vec![],
            results: vec![],
            recv: Some(t),
            variadic: false,
        }));
        let sig_ptr = b.types_mut().intern(TypeKind::Signature(Signature {
            params: vec![],
            results: vec![],
            recv: Some(pt),
            variadic: false,
        }));

        let by_val = b.declare_func(None, "ByValue", sig_val);
        let by_ptr = b.declare_func(None, "ByPointer", sig_ptr);
        b.types_mut().add_method(t, "ByValue", by_val);
        b.types_mut().add_method(t, "ByPointer", by_ptr);

        let prog = b.finish().unwrap();

        let value_set = prog.method_set(t);
        assert_eq!(value_set.lookup("ByValue"), Some(by_val));
        assert_eq!(value_set.lookup("ByPointer"), None);

        let pointer_set = prog.method_set(pt);
        assert_eq!(pointer_set.lookup("ByValue"), Some(by_val));
        assert_eq!(pointer_set.lookup("ByPointer"), Some(by_ptr));
    }
}
