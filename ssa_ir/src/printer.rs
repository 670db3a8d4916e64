//! Human-readable rendering of values, instructions and functions.
//!
//! The output is a disassembly meant for debugging and golden tests, not a
//! parseable format. Registers print as their value names (`t3`),
//! instructions as `t3 = lookup m k` style lines, and whole functions as a
//! block-structured listing.

use crate::ids::{FuncId, InstrId, ValueId};
use crate::instr::{CallCommon, CallTarget, InstrKind, UnOpKind};
use crate::program::Program;
use crate::value::{ConstValue, ValueKind};

impl Program {
    /// The operand form of a value: its register name, constant literal,
    /// or symbol name.
    pub fn value_string(&self, v: ValueId) -> String {
        let val = self.value(v);
        match &val.kind {
            ValueKind::Const(c) => match c {
                ConstValue::Str(s) => format!("{:?}:{}", s, self.type_string(val.ty)),
                ConstValue::Nil => format!("nil:{}", self.type_string(val.ty)),
                _ => format!("{}:{}", val.name, self.type_string(val.ty)),
            },
            ValueKind::Function(f) => self.qualified_name(*f),
            _ => val.name.clone(),
        }
    }

    fn call_string(&self, kind: &str, c: &CallCommon) -> String {
        let args: Vec<String> = c.args.iter().map(|&a| self.value_string(a)).collect();
        match &c.callee {
            CallTarget::Invoke { recv, method } => format!(
                "{}invoke {}.{}({})",
                kind,
                self.value_string(*recv),
                method,
                args.join(", ")
            ),
            CallTarget::Value(v) => {
                format!("{}{}({})", kind, self.value_string(*v), args.join(", "))
            }
        }
    }

    /// One-line disassembly of an instruction, without the result
    /// assignment prefix.
    pub fn instr_string(&self, id: InstrId) -> String {
        let vs = |v: ValueId| self.value_string(v);
        match &self.instr(id).kind {
            InstrKind::BinOp { op, x, y } => format!("{} {:?} {}", vs(*x), op, vs(*y)),
            InstrKind::UnOp { op, x, comma_ok } => {
                let sigil = match op {
                    UnOpKind::Neg => "-",
                    UnOpKind::Not => "!",
                    UnOpKind::BitNot => "^",
                    UnOpKind::Load => "*",
                    UnOpKind::Recv => "<-",
                };
                if *comma_ok {
                    format!("{}{},ok", sigil, vs(*x))
                } else {
                    format!("{}{}", sigil, vs(*x))
                }
            }
            InstrKind::FieldAddr { x, field } => format!("&{}.[{}]", vs(*x), field),
            InstrKind::Field { x, field } => format!("{}.[{}]", vs(*x), field),
            InstrKind::IndexAddr { x, index } => format!("&{}[{}]", vs(*x), vs(*index)),
            InstrKind::Index { x, index } => format!("{}[{}]", vs(*x), vs(*index)),
            InstrKind::Lookup { map, key, comma_ok } => {
                if *comma_ok {
                    format!("{}[{}],ok", vs(*map), vs(*key))
                } else {
                    format!("{}[{}]", vs(*map), vs(*key))
                }
            }
            InstrKind::TypeAssert { x, asserted, .. } => {
                format!("typeassert {}.({})", vs(*x), self.type_string(*asserted))
            }
            InstrKind::Extract { tuple, index } => format!("extract {} #{}", vs(*tuple), index),
            InstrKind::Phi { edges } => {
                let parts: Vec<String> = edges.iter().map(|&e| vs(e)).collect();
                format!("phi [{}]", parts.join(", "))
            }
            InstrKind::Alloc { heap } => {
                if *heap {
                    "new".to_string()
                } else {
                    "local".to_string()
                }
            }
            InstrKind::MakeSlice { len, cap } => format!("make slice {} {}", vs(*len), vs(*cap)),
            InstrKind::MakeMap { reserve } => match reserve {
                Some(r) => format!("make map {}", vs(*r)),
                None => "make map".to_string(),
            },
            InstrKind::MakeChan { size } => format!("make chan {}", vs(*size)),
            InstrKind::MakeClosure { func, bindings } => {
                let parts: Vec<String> = bindings.iter().map(|&b| vs(b)).collect();
                format!(
                    "make closure {} [{}]",
                    self.qualified_name(*func),
                    parts.join(", ")
                )
            }
            InstrKind::MakeInterface { x } => {
                let ty = self.value(*x).ty;
                format!("make interface <- {} ({})", self.type_string(ty), vs(*x))
            }
            InstrKind::ChangeType { x } => format!("changetype {}", vs(*x)),
            InstrKind::Convert { x } => format!("convert {}", vs(*x)),
            InstrKind::MultiConvert { x } => format!("multiconvert {}", vs(*x)),
            InstrKind::ChangeInterface { x } => format!("change interface {}", vs(*x)),
            InstrKind::SliceToArrayPointer { x } => format!("slice to array pointer {}", vs(*x)),
            InstrKind::Store { addr, val } => format!("*{} = {}", vs(*addr), vs(*val)),
            InstrKind::MapUpdate { map, key, value } => {
                format!("{}[{}] = {}", vs(*map), vs(*key), vs(*value))
            }
            InstrKind::Send { chan, x } => format!("send {} <- {}", vs(*chan), vs(*x)),
            InstrKind::Call(c) => self.call_string("", c),
            InstrKind::Defer(c) => self.call_string("defer ", c),
            InstrKind::Go(c) => self.call_string("go ", c),
            InstrKind::RunDefers => "rundefers".to_string(),
            InstrKind::Panic { x } => format!("panic {}", vs(*x)),
            InstrKind::Return { results } => {
                if results.is_empty() {
                    "return".to_string()
                } else {
                    let parts: Vec<String> = results.iter().map(|&r| vs(r)).collect();
                    format!("return {}", parts.join(", "))
                }
            }
            InstrKind::Jump => {
                let block = self.instr(id).block;
                match self.block(block).succs.first() {
                    Some(s) => format!("jump {}", self.block(*s).index),
                    None => "jump".to_string(),
                }
            }
            InstrKind::If { cond } => {
                let block = self.instr(id).block;
                let succs = &self.block(block).succs;
                match (succs.first(), succs.get(1)) {
                    (Some(t), Some(f)) => format!(
                        "if {} goto {} else {}",
                        vs(*cond),
                        self.block(*t).index,
                        self.block(*f).index
                    ),
                    _ => format!("if {}", vs(*cond)),
                }
            }
            InstrKind::Range { x } => format!("range {}", vs(*x)),
            InstrKind::Next { iter, is_string } => {
                if *is_string {
                    format!("next {} (string)", vs(*iter))
                } else {
                    format!("next {}", vs(*iter))
                }
            }
            InstrKind::Select { states, blocking } => {
                let mode = if *blocking { "blocking" } else { "nonblocking" };
                format!("select {} [{} cases]", mode, states.len())
            }
            InstrKind::DebugRef { x } => format!("; debug {}", vs(*x)),
        }
    }

    /// Block-structured disassembly of a whole function.
    pub fn func_string(&self, f: FuncId) -> String {
        let func = self.func(f);
        let mut out = String::new();
        out.push_str(&format!(
            "func {} {}:\n",
            self.qualified_name(f),
            self.type_string(func.signature)
        ));
        if !func.is_defined() {
            out.push_str("\t(external)\n");
            return out;
        }
        for &bid in &func.blocks {
            let block = self.block(bid);
            out.push_str(&format!("{}:\n", block.index));
            for &iid in &block.instrs {
                match self.instr(iid).result {
                    Some(r) => out.push_str(&format!(
                        "\t{} = {}\n",
                        self.value(r).name,
                        self.instr_string(iid)
                    )),
                    None => out.push_str(&format!("\t{}\n", self.instr_string(iid))),
                }
            }
        }
        out
    }
}
