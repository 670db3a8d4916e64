//! Whole-program call-graph construction over the [`ssa_ir`] intermediate
//! representation.
//!
//! Four analyzers populate the same [`graph::CallGraph`] structure with
//! different precision/cost trade-offs:
//!
//! - [`statics`]: statically resolved sites only (unsound, precise)
//! - [`cha`]: class-hierarchy analysis (sound, imprecise)
//! - [`rta`]: rapid type analysis, reachability-driven
//! - [`vta`]: variable-type analysis over a type-propagation graph
//!
//! The graph is then post-processed (`delete_synthetic_nodes`) and handed
//! to [`format::write_graph`], which renders one record per edge in a
//! deterministic order. Analyses are single-threaded per run and poll an
//! optional [`cancel::CancelToken`]; given identical IR they produce
//! identical edge sets and visitation orders.

pub mod algo;
pub mod cancel;
pub mod cha;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod graph;
pub mod rta;
pub mod statics;
pub mod vta;

pub use algo::Algorithm;
pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use format::{write_graph, Template, DEFAULT_TEMPLATE};
pub use graph::{CallGraph, Edge, EdgeId, Node, NodeId};
pub use rta::RtaResult;
