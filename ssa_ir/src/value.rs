//! Values: everything an instruction operand can refer to.

use serde::{Deserialize, Serialize};

use crate::ids::{FuncId, GlobalId, InstrId, TypeId};

/// A compile-time constant. Constants are operands, never instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    /// The zero value of a pointer-like type.
    Nil,
}

/// What a [`Value`] is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueKind {
    /// The result register of an instruction.
    Register { instr: InstrId },
    /// A function parameter. For methods, parameter 0 is the receiver.
    Param { func: FuncId, index: u32 },
    /// A free variable captured by a closure.
    FreeVar { func: FuncId, index: u32 },
    /// The address of a package-level variable.
    Global(GlobalId),
    /// A function symbol.
    Function(FuncId),
    /// A built-in operation (`len`, `append`, ...). Built-ins have no
    /// Function object and never contribute call-graph edges.
    Builtin(String),
    Const(ConstValue),
}

/// An SSA value. Carries the inverse of the operand relation: `referrers`
/// lists exactly the instructions that hold this value as an operand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    pub kind: ValueKind,
    pub ty: TypeId,
    pub name: String,
    #[serde(default)]
    pub(crate) referrers: Vec<InstrId>,
}

impl Value {
    pub fn referrers(&self) -> &[InstrId] {
        &self.referrers
    }

    pub fn as_function(&self) -> Option<FuncId> {
        match self.kind {
            ValueKind::Function(f) => Some(f),
            _ => None,
        }
    }
}
