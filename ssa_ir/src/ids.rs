//! Stable integer ids for the program arenas.
//!
//! All cross-references inside the IR are ids into `Program`-owned tables,
//! never owning references, so the Function/Block/Instruction/Value cycle
//! has no ownership cycle. Ids are assigned monotonically at build time and
//! never reused, which makes them usable as deterministic ordering keys.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Id of a [`crate::Function`] in its program.
    FuncId
);
define_id!(
    /// Id of a [`crate::BasicBlock`] in its program.
    BlockId
);
define_id!(
    /// Id of an [`crate::Instruction`] in its program.
    InstrId
);
define_id!(
    /// Id of a [`crate::Value`] in its program.
    ValueId
);
define_id!(
    /// Id of a type in the program's [`crate::types::TypeStore`].
    TypeId
);
define_id!(
    /// Id of a [`crate::Global`] in its program.
    GlobalId
);
define_id!(
    /// Id of a [`crate::Package`] in its program.
    PkgId
);
