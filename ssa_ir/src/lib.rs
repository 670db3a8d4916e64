//! An arena-based SSA intermediate representation for whole-program
//! analysis.
//!
//! A [`Program`] exclusively owns its packages, functions, basic blocks,
//! instructions, values, globals and types; every cross-reference is a
//! stable integer id, so the Function/Block/Instruction/Value cycle carries
//! no ownership cycle and ids double as deterministic ordering keys.
//!
//! Programs are constructed through [`builder::ProgramBuilder`] (or
//! deserialized from an external builder's JSON via [`Program::from_json`])
//! and are immutable afterwards. The only mutable state on a frozen program
//! is its set of memoization caches, each guarded by its own mutex.

pub mod block;
pub mod builder;
pub mod dom;
pub mod error;
pub mod func;
pub mod ids;
pub mod instr;
pub mod pos;
pub mod printer;
pub mod program;
pub mod types;
pub mod value;

pub use block::BasicBlock;
pub use builder::{validate, FunctionBuilder, ProgramBuilder};
pub use error::InvalidIr;
pub use func::{Function, Synthetic};
pub use ids::{BlockId, FuncId, GlobalId, InstrId, PkgId, TypeId, ValueId};
pub use instr::{
    BinOpKind, CallCommon, CallKind, CallTarget, InstrKind, Instruction, SelectState, UnOpKind,
};
pub use pos::{Pos, Position};
pub use program::{Global, Member, NamedConst, Package, Program};
pub use value::{ConstValue, Value, ValueKind};
