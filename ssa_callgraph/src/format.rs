//! Edge formatting.
//!
//! Every edge of a call graph is rendered as one record, in the graph's
//! deterministic visitation order. Two pre-canned styles (`digraph` and
//! `graphviz`) cover the common cases; anything else is parsed as a
//! template over the per-edge fields `{{.Caller}}`, `{{.Callee}}`,
//! `{{.Filename}}`, `{{.Offset}}`, `{{.Line}}`, `{{.Column}}`,
//! `{{.Dynamic}}` and `{{.Description}}`, plus the position helper
//! `{{posn .Caller}}` / `{{(posn .Callee).Line}}` over a function's
//! declaration. A bad template is reported once, before any record is
//! produced. Records always end in a newline; missing newlines are padded.

use std::io::Write;

use ssa_ir::{Position, Program};

use crate::error::{Error, Result};
use crate::graph::{CallGraph, Edge};

/// The default edge template of the command-line tool.
pub const DEFAULT_TEMPLATE: &str =
    "{{.Caller}}\t--{{.Dynamic}}-{{.Line}}:{{.Column}}-->\t{{.Callee}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PosnField {
    Full,
    Filename,
    Line,
    Column,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldRef {
    Caller,
    Callee,
    Filename,
    Offset,
    Line,
    Column,
    Dynamic,
    Description,
    /// `posn .Caller` / `posn .Callee`, optionally narrowed to one field.
    Posn { of_callee: bool, field: PosnField },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(FieldRef),
}

/// A parsed edge template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(spec: &str) -> Result<Template> {
        let mut segments = Vec::new();
        let mut rest = spec;
        while let Some(open) = rest.find("{{") {
            if !rest[..open].is_empty() {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let after = &rest[open + 2..];
            let Some(close) = after.find("}}") else {
                return Err(Error::InvalidFormat {
                    reason: format!("unclosed '{{{{' in template: {spec:?}"),
                });
            };
            segments.push(Segment::Field(parse_expr(&after[..close])?));
            rest = &after[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }
        Ok(Template { segments })
    }

    fn render(&self, data: &EdgeData) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Text(t) => out.push_str(t),
                Segment::Field(f) => data.render_field(f, &mut out),
            }
        }
        out
    }
}

fn parse_expr(raw: &str) -> Result<FieldRef> {
    let s = raw.trim();
    if let Some(name) = s.strip_prefix('.') {
        return match name {
            "Caller" => Ok(FieldRef::Caller),
            "Callee" => Ok(FieldRef::Callee),
            "Filename" => Ok(FieldRef::Filename),
            "Offset" => Ok(FieldRef::Offset),
            "Line" => Ok(FieldRef::Line),
            "Column" => Ok(FieldRef::Column),
            "Dynamic" => Ok(FieldRef::Dynamic),
            "Description" => Ok(FieldRef::Description),
            other => Err(Error::InvalidFormat {
                reason: format!("unknown field '.{other}'"),
            }),
        };
    }
    if let Some(who) = s.strip_prefix("posn ") {
        return Ok(FieldRef::Posn {
            of_callee: parse_posn_target(who.trim())?,
            field: PosnField::Full,
        });
    }
    if let Some(inner) = s.strip_prefix("(posn ") {
        let Some(paren) = inner.find(')') else {
            return Err(Error::InvalidFormat {
                reason: format!("unclosed '(posn' in {s:?}"),
            });
        };
        let of_callee = parse_posn_target(inner[..paren].trim())?;
        let field = match &inner[paren + 1..] {
            ".Filename" => PosnField::Filename,
            ".Line" => PosnField::Line,
            ".Column" => PosnField::Column,
            other => {
                return Err(Error::InvalidFormat {
                    reason: format!("unknown position field {other:?}"),
                })
            }
        };
        return Ok(FieldRef::Posn { of_callee, field });
    }
    Err(Error::InvalidFormat {
        reason: format!("cannot parse template expression {s:?}"),
    })
}

fn parse_posn_target(s: &str) -> Result<bool> {
    match s {
        ".Caller" => Ok(false),
        ".Callee" => Ok(true),
        other => Err(Error::InvalidFormat {
            reason: format!("posn expects .Caller or .Callee, got {other:?}"),
        }),
    }
}

/// Everything a template can render for one edge.
#[derive(Debug)]
struct EdgeData {
    caller: String,
    callee: String,
    site: Position,
    dynamic: &'static str,
    description: String,
    caller_posn: Position,
    callee_posn: Position,
}

impl EdgeData {
    fn new(prog: &Program, cg: &CallGraph, edge: &Edge) -> Self {
        let name = |id| match cg.node(id).func {
            Some(f) => prog.qualified_name(f),
            None => "<root>".to_string(),
        };
        let posn = |id| match cg.node(id).func {
            Some(f) => prog.position(prog.func(f).pos),
            None => Position::default(),
        };
        let (site, description) = match edge.site {
            Some(s) => (
                prog.position(prog.instr(s).pos),
                prog.instr(s).call_description(prog),
            ),
            None => (Position::default(), "root".to_string()),
        };
        Self {
            caller: name(edge.caller),
            callee: name(edge.callee),
            site,
            dynamic: if edge.is_dynamic(prog) {
                "dynamic"
            } else {
                "static"
            },
            description,
            caller_posn: posn(edge.caller),
            callee_posn: posn(edge.callee),
        }
    }

    fn render_field(&self, f: &FieldRef, out: &mut String) {
        use std::fmt::Write as _;
        match f {
            FieldRef::Caller => out.push_str(&self.caller),
            FieldRef::Callee => out.push_str(&self.callee),
            FieldRef::Filename => out.push_str(&self.site.filename),
            FieldRef::Offset => {
                let _ = write!(out, "{}", self.site.offset);
            }
            FieldRef::Line => {
                let _ = write!(out, "{}", self.site.line);
            }
            FieldRef::Column => {
                let _ = write!(out, "{}", self.site.column);
            }
            FieldRef::Dynamic => out.push_str(self.dynamic),
            FieldRef::Description => out.push_str(&self.description),
            FieldRef::Posn { of_callee, field } => {
                let p = if *of_callee {
                    &self.callee_posn
                } else {
                    &self.caller_posn
                };
                match field {
                    PosnField::Full => {
                        let _ = write!(out, "{}", p);
                    }
                    PosnField::Filename => out.push_str(&p.filename),
                    PosnField::Line => {
                        let _ = write!(out, "{}", p.line);
                    }
                    PosnField::Column => {
                        let _ = write!(out, "{}", p.column);
                    }
                }
            }
        }
    }
}

fn write_record(out: &mut dyn Write, record: &str) -> Result<()> {
    out.write_all(record.as_bytes())?;
    if !record.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Render every edge of `cg` to `out` under `format`: `digraph`,
/// `graphviz`, or a custom template.
pub fn write_graph(
    prog: &Program,
    cg: &CallGraph,
    format: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let (before, after, template) = match format {
        "digraph" => (None, None, None),
        "graphviz" => (Some("digraph callgraph {\n"), Some("}\n"), None),
        custom => (None, None, Some(Template::parse(custom)?)),
    };

    if let Some(b) = before {
        out.write_all(b.as_bytes())?;
    }
    cg.visit_edges(prog, |_, edge| -> Result<()> {
        let data = EdgeData::new(prog, cg, edge);
        let record = match (&template, format) {
            (Some(t), _) => t.render(&data),
            (None, "graphviz") => format!("  {:?} -> {:?}", data.caller, data.callee),
            _ => format!("{:?} {:?}", data.caller, data.callee),
        };
        write_record(out, &record)
    })?;
    if let Some(a) = after {
        out.write_all(a.as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_template() {
        let t = Template::parse(DEFAULT_TEMPLATE).unwrap();
        assert!(t
            .segments
            .iter()
            .any(|s| matches!(s, Segment::Field(FieldRef::Dynamic))));
    }

    #[test]
    fn test_parse_posn_helpers() {
        assert!(Template::parse("{{posn .Caller}}").is_ok());
        assert!(Template::parse("{{(posn .Callee).Filename}}").is_ok());
        assert!(Template::parse("{{(posn .Caller).Line}}").is_ok());
    }

    #[test]
    fn test_invalid_templates_fail_upfront() {
        assert!(matches!(
            Template::parse("{{.Nope}}"),
            Err(Error::InvalidFormat { .. })
        ));
        assert!(matches!(
            Template::parse("{{.Caller"),
            Err(Error::InvalidFormat { .. })
        ));
        assert!(matches!(
            Template::parse("{{posn .Site}}"),
            Err(Error::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_plain_text_passes_through() {
        let t = Template::parse("nothing to expand").unwrap();
        assert_eq!(t.segments.len(), 1);
    }
}
