//! callgraph: report the call graph of a program in SSA form.
//!
//! Usage:
//!   callgraph [--algo=static|cha|rta|vta] [--test] [--format=...] program.json

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use ssa_callgraph::{cha, rta, statics, vta};
use ssa_callgraph::{write_graph, Algorithm, Error, DEFAULT_TEMPLATE};
use ssa_ir::{FuncId, Program};

const USAGE: &str = r#"callgraph: display the call graph of a program in SSA form.

Usage:

  callgraph [--algo=static|cha|rta|vta] [--test] [--format=...] program.json

The input is a JSON-serialized SSA program as produced by the loader.

Flags:

--algo     Specifies the call-graph construction algorithm, one of:

            static      static calls only (unsound)
            cha         Class Hierarchy Analysis
            rta         Rapid Type Analysis
            vta         Variable Type Analysis

           The algorithms are ordered by increasing precision in their
           treatment of dynamic calls (and thus also computational cost).
           RTA requires a whole program with a main package and includes
           only functions reachable from main.

--test     Consider main packages synthesized from test code when
           selecting analysis roots.

--format   Specifies the format in which each call graph edge is
           displayed. One of:

            digraph     one space-separated quoted caller/callee pair
                        per line
            graphviz    output in .dot format

           All other values are interpreted as an edge template over the
           fields .Caller, .Callee, .Filename, .Offset, .Line, .Column,
           .Dynamic and .Description, written {{.Field}}; the helper
           posn gives a function's declaration position, as in
           {{(posn .Caller).Filename}}. The default value is:

            {{.Caller}}\t--{{.Dynamic}}-{{.Line}}:{{.Column}}-->\t{{.Callee}}
"#;

#[derive(Debug)]
struct Options {
    algo: String,
    test: bool,
    format: String,
    input: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut opts = Options {
        algo: "rta".to_string(),
        test: false,
        format: DEFAULT_TEMPLATE.to_string(),
        input: None,
    };
    while let Some(arg) = args.next() {
        let flag = arg.trim_start_matches('-');
        if !arg.starts_with('-') {
            if opts.input.is_some() {
                return Err(format!("unexpected extra argument: {arg}"));
            }
            opts.input = Some(arg);
            continue;
        }
        let (name, inline_value) = match flag.split_once('=') {
            Some((n, v)) => (n, Some(v.to_string())),
            None => (flag, None),
        };
        match name {
            "test" => {
                if inline_value.is_some() {
                    return Err("--test takes no value".to_string());
                }
                opts.test = true;
            }
            "algo" | "format" => {
                let value = match inline_value {
                    Some(v) => v,
                    None => args
                        .next()
                        .ok_or_else(|| format!("--{name} requires a value"))?,
                };
                if name == "algo" {
                    opts.algo = value;
                } else {
                    opts.format = value;
                }
            }
            "help" | "h" => return Err(String::new()),
            other => return Err(format!("unknown flag: -{other}")),
        }
    }
    Ok(opts)
}

/// RTA roots: `init` and `main` of every main package in scope.
fn main_roots(prog: &Program, include_tests: bool) -> Result<Vec<FuncId>, Error> {
    let mut roots = Vec::new();
    for pkg in prog.packages() {
        if pkg.name != "main" {
            continue;
        }
        if pkg.is_test && !include_tests {
            continue;
        }
        let Some(main) = pkg.func("main") else {
            continue;
        };
        if let Some(init) = pkg.init {
            roots.push(init);
        }
        roots.push(main);
    }
    if roots.is_empty() {
        return Err(Error::NoEntryPoint);
    }
    Ok(roots)
}

fn run(opts: &Options) -> Result<(), Error> {
    let algo = Algorithm::parse(&opts.algo)?;

    let input = opts.input.as_deref().expect("checked by caller");
    let data = fs::read_to_string(input)?;
    let prog = Program::from_json(&data)?;

    let mut cg = match algo {
        Algorithm::Static => statics::call_graph(&prog, None)?,
        Algorithm::Cha => cha::call_graph(&prog, None)?,
        Algorithm::Rta => {
            let roots = main_roots(&prog, opts.test)?;
            rta::analyze(&prog, &roots, None)?.call_graph
        }
        Algorithm::Vta => vta::call_graph_all(&prog, None, None)?,
    };

    cg.delete_synthetic_nodes(&prog);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_graph(&prog, &cg, &opts.format, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let opts = match parse_args(env::args().skip(1)) {
        Ok(opts) => opts,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("callgraph: {msg}");
            }
            eprint!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    if opts.input.is_none() {
        eprint!("{USAGE}");
        return ExitCode::FAILURE;
    }
    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("callgraph: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_defaults() {
        let opts = parse_args(["prog.json".to_string()].into_iter()).unwrap();
        assert_eq!(opts.algo, "rta");
        assert!(!opts.test);
        assert_eq!(opts.format, DEFAULT_TEMPLATE);
        assert_eq!(opts.input.as_deref(), Some("prog.json"));
    }

    #[test]
    fn test_parse_args_inline_and_split_values() {
        let opts = parse_args(
            ["--algo=cha", "--format", "digraph", "--test", "p.json"]
                .into_iter()
                .map(String::from),
        )
        .unwrap();
        assert_eq!(opts.algo, "cha");
        assert_eq!(opts.format, "digraph");
        assert!(opts.test);
    }

    #[test]
    fn test_parse_args_rejects_unknown_flag() {
        assert!(parse_args(["--frobnicate".to_string()].into_iter()).is_err());
    }
}
