//! Source positions.
//!
//! A [`Pos`] is a compact reference into the program's file table plus byte
//! offset and 1-indexed line/column. The owning [`crate::Program`] resolves
//! it to a [`Position`] carrying the file name.

use serde::{Deserialize, Serialize};

/// Compact source position: file-table index, byte offset, 1-indexed
/// line and column. `Pos::NONE` marks operations with no source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub file: u32,
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub const NONE: Pos = Pos {
        file: u32::MAX,
        offset: 0,
        line: 0,
        column: 0,
    };

    pub fn new(file: u32, offset: u32, line: u32, column: u32) -> Self {
        Self {
            file,
            offset,
            line,
            column,
        }
    }

    pub fn is_none(&self) -> bool {
        self.file == u32::MAX
    }
}

impl Default for Pos {
    fn default() -> Self {
        Pos::NONE
    }
}

/// A position resolved against the program's file table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub filename: String,
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.filename.is_empty() && self.line == 0 {
            return write!(f, "-");
        }
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}
