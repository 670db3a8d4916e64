//! The static call-graph analyzer.
//!
//! Walks every instruction of every defined function and records only
//! call sites whose callee is statically known. Dynamic sites are ignored,
//! so the result is unsound (some real runtime calls are missing) but
//! every recorded edge is precise.

use ssa_ir::Program;

use crate::cancel::{self, CancelToken};
use crate::diagnostics::{self, Event};
use crate::error::Result;
use crate::graph::CallGraph;

pub fn call_graph(prog: &Program, cancel: Option<&CancelToken>) -> Result<CallGraph> {
    let mut cg = CallGraph::new(prog);
    for f in prog.all_functions() {
        cancel::check(cancel)?;
        if !prog.func(f).is_defined() {
            continue;
        }
        for site in prog.func_instrs(f) {
            if let Some(common) = prog.instr(site).call_common() {
                if let Some(callee) = common.static_callee(prog) {
                    cg.add_call_edge(f, callee, Some(site))?;
                    if !prog.func(callee).is_defined() {
                        diagnostics::emit(Event::SkippedExternal { func: callee });
                    }
                }
            }
        }
    }
    Ok(cg)
}
