//! Functions.

use serde::{Deserialize, Serialize};

use crate::ids::{BlockId, FuncId, PkgId, TypeId, ValueId};
use crate::pos::Pos;

/// Provenance of a function the builder synthesized rather than the user
/// wrote. `None` provenance means user-written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Synthetic {
    /// Promoted-method wrapper.
    Wrapper,
    /// Thunk bridging a method expression to a standalone function.
    Thunk,
    /// Bound-method closure body.
    Bound,
    /// Yield body of a range-over-func loop.
    RangeYield,
    /// Instantiation of a generic function.
    Instance,
    /// Package initializer.
    Init,
    /// Empty stub standing in for an externally defined function.
    Stub,
}

impl Synthetic {
    /// Synthetic kinds elided by call-graph synthetic-node deletion.
    pub fn is_elidable(self) -> bool {
        matches!(self, Synthetic::Wrapper | Synthetic::Thunk | Synthetic::Bound)
    }
}

/// A function. Either defined (non-empty block list) or external (no
/// blocks); external functions are terminal nodes in every analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Declared name; not required to be unique.
    pub name: String,
    /// Owning package; shared synthetic functions have none.
    pub pkg: Option<PkgId>,
    /// Signature type. For methods, the signature carries the receiver and
    /// parameter 0 of `params` is the receiver value.
    pub signature: TypeId,
    pub params: Vec<ValueId>,
    pub free_vars: Vec<ValueId>,
    pub blocks: Vec<BlockId>,
    /// Enclosing function for anonymous functions.
    #[serde(default)]
    pub enclosing: Option<FuncId>,
    #[serde(default)]
    pub synthetic: Option<Synthetic>,
    /// Type parameters of a generic function (empty for non-generics).
    #[serde(default)]
    pub type_params: Vec<String>,
    /// Type arguments of an instantiated function (empty otherwise).
    #[serde(default)]
    pub type_args: Vec<TypeId>,
    /// The generic this function was instantiated from. Instances share
    /// their position with the origin but are distinct objects.
    #[serde(default)]
    pub origin: Option<FuncId>,
    #[serde(default)]
    pub pos: Pos,
}

impl Function {
    /// A function with no blocks is external: its body is unavailable and
    /// no outgoing edges are ever derived from it.
    pub fn is_defined(&self) -> bool {
        !self.blocks.is_empty()
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty() && self.type_args.is_empty()
    }

    pub fn is_instance(&self) -> bool {
        !self.type_args.is_empty()
    }
}
