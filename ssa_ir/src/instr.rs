//! Instructions: the closed sum of operations, plus the shared call payload.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ids::{BlockId, FuncId, InstrId, TypeId, ValueId};
use crate::pos::Pos;
use crate::program::Program;
use crate::types::ChanDir;
use crate::value::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOpKind {
    Neg,
    Not,
    BitNot,
    /// Pointer load (dereference).
    Load,
    /// Channel receive.
    Recv,
}

/// The three call-family instruction kinds sharing a [`CallCommon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    Call,
    Defer,
    Go,
}

/// How a call site names its callee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallTarget {
    /// An ordinary call of a function value: a function symbol, a closure,
    /// or an arbitrary function-typed value (dynamic).
    Value(ValueId),
    /// Interface method invocation: the callee is determined at runtime by
    /// the dynamic type of the receiver.
    Invoke { recv: ValueId, method: String },
}

/// The payload shared by Call, Defer and Go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallCommon {
    pub callee: CallTarget,
    /// Arguments, excluding the invoke receiver.
    pub args: Vec<ValueId>,
    /// Signature type of the call.
    pub signature: TypeId,
}

impl CallCommon {
    pub fn is_invoke(&self) -> bool {
        matches!(self.callee, CallTarget::Invoke { .. })
    }

    pub fn signature(&self) -> TypeId {
        self.signature
    }

    /// The statically known callee, if any: a function symbol used directly
    /// as the callee, or the function of an immediately preceding
    /// make-closure.
    pub fn static_callee(&self, prog: &Program) -> Option<FuncId> {
        let v = match self.callee {
            CallTarget::Value(v) => v,
            CallTarget::Invoke { .. } => return None,
        };
        match prog.value(v).kind {
            ValueKind::Function(f) => Some(f),
            ValueKind::Register { instr } => match prog.instr(instr).kind {
                InstrKind::MakeClosure { func, .. } => Some(func),
                _ => None,
            },
            _ => None,
        }
    }

    /// Human-readable description of the call mode.
    pub fn description(&self, prog: &Program) -> &'static str {
        match &self.callee {
            CallTarget::Invoke { .. } => "dynamic method call",
            CallTarget::Value(_) => match self.static_callee(prog) {
                Some(f) => {
                    let sig = prog.func(f).signature;
                    let is_method = prog
                        .types()
                        .as_signature(sig)
                        .is_some_and(|s| s.recv.is_some());
                    if is_method {
                        "static method call"
                    } else {
                        "static function call"
                    }
                }
                None => "dynamic function call",
            },
        }
    }

    /// Every value the payload holds: callee (or receiver) then arguments.
    pub fn values(&self) -> SmallVec<[ValueId; 4]> {
        let mut out = SmallVec::new();
        match &self.callee {
            CallTarget::Value(v) => out.push(*v),
            CallTarget::Invoke { recv, .. } => out.push(*recv),
        }
        out.extend(self.args.iter().copied());
        out
    }

    fn values_mut(&mut self) -> Vec<&mut ValueId> {
        let mut out = Vec::with_capacity(1 + self.args.len());
        match &mut self.callee {
            CallTarget::Value(v) => out.push(v),
            CallTarget::Invoke { recv, .. } => out.push(recv),
        }
        out.extend(self.args.iter_mut());
        out
    }
}

/// One communication case of a Select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectState {
    pub dir: ChanDir,
    pub chan: ValueId,
    /// Sent value for send cases.
    pub send: Option<ValueId>,
}

/// The closed set of instruction kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstrKind {
    BinOp {
        op: BinOpKind,
        x: ValueId,
        y: ValueId,
    },
    UnOp {
        op: UnOpKind,
        x: ValueId,
        /// For Recv: also produce the "ok" component (a tuple result).
        comma_ok: bool,
    },
    /// Address of field `field` of the struct pointed to by `x`.
    FieldAddr {
        x: ValueId,
        field: u32,
    },
    /// Field `field` of struct value `x`.
    Field {
        x: ValueId,
        field: u32,
    },
    IndexAddr {
        x: ValueId,
        index: ValueId,
    },
    Index {
        x: ValueId,
        index: ValueId,
    },
    /// Map lookup.
    Lookup {
        map: ValueId,
        key: ValueId,
        comma_ok: bool,
    },
    TypeAssert {
        x: ValueId,
        asserted: TypeId,
        comma_ok: bool,
    },
    /// Component `index` of a tuple value.
    Extract {
        tuple: ValueId,
        index: u32,
    },
    Phi {
        /// One incoming value per predecessor, in predecessor order.
        edges: Vec<ValueId>,
    },
    /// Allocation; `heap` distinguishes heap from frame-local.
    Alloc {
        heap: bool,
    },
    MakeSlice {
        len: ValueId,
        cap: ValueId,
    },
    MakeMap {
        reserve: Option<ValueId>,
    },
    MakeChan {
        size: ValueId,
    },
    MakeClosure {
        func: FuncId,
        bindings: Vec<ValueId>,
    },
    /// Box a concrete value into an interface, recording its type.
    MakeInterface {
        x: ValueId,
    },
    /// Value-preserving type change.
    ChangeType {
        x: ValueId,
    },
    /// Real conversion that may change representation.
    Convert {
        x: ValueId,
    },
    /// Conversion with type parameters on either side.
    MultiConvert {
        x: ValueId,
    },
    ChangeInterface {
        x: ValueId,
    },
    SliceToArrayPointer {
        x: ValueId,
    },
    Store {
        addr: ValueId,
        val: ValueId,
    },
    MapUpdate {
        map: ValueId,
        key: ValueId,
        value: ValueId,
    },
    Send {
        chan: ValueId,
        x: ValueId,
    },
    Call(CallCommon),
    Defer(CallCommon),
    Go(CallCommon),
    RunDefers,
    Panic {
        x: ValueId,
    },
    Return {
        results: Vec<ValueId>,
    },
    /// Unconditional jump to the sole successor.
    Jump,
    /// Two-way branch: successor 0 on true, successor 1 on false.
    If {
        cond: ValueId,
    },
    /// Produce an opaque iterator over `x`.
    Range {
        x: ValueId,
    },
    /// Advance an iterator; yields an (ok, key, value) tuple.
    Next {
        iter: ValueId,
        is_string: bool,
    },
    Select {
        states: Vec<SelectState>,
        blocking: bool,
    },
    DebugRef {
        x: ValueId,
    },
}

impl InstrKind {
    /// Is this a block terminator?
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstrKind::Jump | InstrKind::If { .. } | InstrKind::Return { .. } | InstrKind::Panic { .. }
        )
    }
}

/// An instruction. Instructions that define a result carry the id of their
/// result register in `result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub kind: InstrKind,
    pub block: BlockId,
    pub func: FuncId,
    #[serde(default)]
    pub pos: Pos,
    #[serde(default)]
    pub result: Option<ValueId>,
}

impl Instruction {
    /// The shared payload of a call-family instruction, if this is one.
    pub fn call_common(&self) -> Option<&CallCommon> {
        match &self.kind {
            InstrKind::Call(c) | InstrKind::Defer(c) | InstrKind::Go(c) => Some(c),
            _ => None,
        }
    }

    pub fn call_kind(&self) -> Option<CallKind> {
        match &self.kind {
            InstrKind::Call(_) => Some(CallKind::Call),
            InstrKind::Defer(_) => Some(CallKind::Defer),
            InstrKind::Go(_) => Some(CallKind::Go),
            _ => None,
        }
    }

    /// Description of a call site including its deferred/spawned mode.
    /// Range sites describe the iterator call of a range-over-func loop;
    /// other non-call instructions yield an empty description.
    pub fn call_description(&self, prog: &Program) -> String {
        match (self.call_kind(), self.call_common()) {
            (Some(CallKind::Call), Some(c)) => c.description(prog).to_string(),
            (Some(CallKind::Defer), Some(c)) => format!("deferred {}", c.description(prog)),
            (Some(CallKind::Go), Some(c)) => format!("go {}", c.description(prog)),
            _ if matches!(self.kind, InstrKind::Range { .. }) => {
                "range-over-func call".to_string()
            }
            _ => String::new(),
        }
    }

    /// All operand value ids, in a fixed per-kind order.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        let mut out = SmallVec::new();
        match &self.kind {
            InstrKind::BinOp { x, y, .. } => {
                out.push(*x);
                out.push(*y);
            }
            InstrKind::UnOp { x, .. }
            | InstrKind::FieldAddr { x, .. }
            | InstrKind::Field { x, .. }
            | InstrKind::MakeInterface { x }
            | InstrKind::ChangeType { x }
            | InstrKind::Convert { x }
            | InstrKind::MultiConvert { x }
            | InstrKind::ChangeInterface { x }
            | InstrKind::SliceToArrayPointer { x }
            | InstrKind::Panic { x }
            | InstrKind::Range { x }
            | InstrKind::DebugRef { x }
            | InstrKind::TypeAssert { x, .. } => out.push(*x),
            InstrKind::IndexAddr { x, index } | InstrKind::Index { x, index } => {
                out.push(*x);
                out.push(*index);
            }
            InstrKind::Lookup { map, key, .. } => {
                out.push(*map);
                out.push(*key);
            }
            InstrKind::Extract { tuple, .. } => out.push(*tuple),
            InstrKind::Phi { edges } => out.extend(edges.iter().copied()),
            InstrKind::Alloc { .. } | InstrKind::RunDefers | InstrKind::Jump => {}
            InstrKind::MakeSlice { len, cap } => {
                out.push(*len);
                out.push(*cap);
            }
            InstrKind::MakeMap { reserve } => out.extend(reserve.iter().copied()),
            InstrKind::MakeChan { size } => out.push(*size),
            InstrKind::MakeClosure { bindings, .. } => out.extend(bindings.iter().copied()),
            InstrKind::Store { addr, val } => {
                out.push(*addr);
                out.push(*val);
            }
            InstrKind::MapUpdate { map, key, value } => {
                out.push(*map);
                out.push(*key);
                out.push(*value);
            }
            InstrKind::Send { chan, x } => {
                out.push(*chan);
                out.push(*x);
            }
            InstrKind::Call(c) | InstrKind::Defer(c) | InstrKind::Go(c) => {
                out.extend(c.values());
            }
            InstrKind::Return { results } => out.extend(results.iter().copied()),
            InstrKind::If { cond } => out.push(*cond),
            InstrKind::Next { iter, .. } => out.push(*iter),
            InstrKind::Select { states, .. } => {
                for s in states {
                    out.push(s.chan);
                    out.extend(s.send.iter().copied());
                }
            }
        }
        out
    }

    /// Mutable references to every operand slot, in the same order as
    /// [`Instruction::operands`]. The renaming pass rewrites these in
    /// place; referrer lists must be maintained by the caller.
    pub fn operands_mut(&mut self) -> Vec<&mut ValueId> {
        let mut out = Vec::new();
        match &mut self.kind {
            InstrKind::BinOp { x, y, .. } => {
                out.push(x);
                out.push(y);
            }
            InstrKind::UnOp { x, .. }
            | InstrKind::FieldAddr { x, .. }
            | InstrKind::Field { x, .. }
            | InstrKind::MakeInterface { x }
            | InstrKind::ChangeType { x }
            | InstrKind::Convert { x }
            | InstrKind::MultiConvert { x }
            | InstrKind::ChangeInterface { x }
            | InstrKind::SliceToArrayPointer { x }
            | InstrKind::Panic { x }
            | InstrKind::Range { x }
            | InstrKind::DebugRef { x }
            | InstrKind::TypeAssert { x, .. } => out.push(x),
            InstrKind::IndexAddr { x, index } | InstrKind::Index { x, index } => {
                out.push(x);
                out.push(index);
            }
            InstrKind::Lookup { map, key, .. } => {
                out.push(map);
                out.push(key);
            }
            InstrKind::Extract { tuple, .. } => out.push(tuple),
            InstrKind::Phi { edges } => out.extend(edges.iter_mut()),
            InstrKind::Alloc { .. } | InstrKind::RunDefers | InstrKind::Jump => {}
            InstrKind::MakeSlice { len, cap } => {
                out.push(len);
                out.push(cap);
            }
            InstrKind::MakeMap { reserve } => out.extend(reserve.iter_mut()),
            InstrKind::MakeChan { size } => out.push(size),
            InstrKind::MakeClosure { bindings, .. } => out.extend(bindings.iter_mut()),
            InstrKind::Store { addr, val } => {
                out.push(addr);
                out.push(val);
            }
            InstrKind::MapUpdate { map, key, value } => {
                out.push(map);
                out.push(key);
                out.push(value);
            }
            InstrKind::Send { chan, x } => {
                out.push(chan);
                out.push(x);
            }
            InstrKind::Call(c) | InstrKind::Defer(c) | InstrKind::Go(c) => {
                out.extend(c.values_mut());
            }
            InstrKind::Return { results } => out.extend(results.iter_mut()),
            InstrKind::If { cond } => out.push(cond),
            InstrKind::Next { iter, .. } => out.push(iter),
            InstrKind::Select { states, .. } => {
                for s in states {
                    out.push(&mut s.chan);
                    out.extend(s.send.iter_mut());
                }
            }
        }
        out
    }
}

/// Ids are stable, so an instruction site is identified by its id.
pub type CallSite = InstrId;
