use std::{collections::BTreeSet, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::analysis::ast::{Ast, NodeId, NodeKind};

/// 1-based line and column of a character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

/// A source file with a precomputed offset to line/column table.
#[derive(Clone, Debug, Default)]
pub struct Source {
    pub filename: String,
    pub content: String,
    pub lines: Vec<String>,
    offsets: Vec<LineColumn>,
}

pub type Sources = std::collections::BTreeMap<String, Arc<Source>>;

impl Source {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let lines = content.split('\n').map(str::to_string).collect();
        let offsets = location_by_offset(&content);
        Self { filename: filename.into(), content, lines, offsets }
    }

    /// Line and column of a byte offset. Offsets at or past the end of the file have none.
    pub fn location(&self, offset: usize) -> Option<LineColumn> {
        self.offsets.get(offset).copied()
    }

    /// The text of a 1-based line.
    pub fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line.checked_sub(1)?).map(String::as_str)
    }

    /// Lines inside function bodies that some node spans completely, i.e. the lines a
    /// breakpoint can be set on.
    pub fn checkpoints(&self, ast: &Ast, root: NodeId) -> Vec<usize> {
        let mut checkpoints = BTreeSet::new();
        for function in ast.walk_and_find(root, NodeKind::FunctionDefinition) {
            for node in ast.walk(function.id) {
                let Some((offset, length)) = parse_src(&node.src) else { continue };
                if let (Some(start), Some(end)) =
                    (self.location(offset), self.location(offset + length))
                {
                    if start.line == end.line {
                        checkpoints.insert(start.line);
                    }
                }
            }
        }
        checkpoints.into_iter().collect()
    }
}

fn parse_src(src: &str) -> Option<(usize, usize)> {
    let mut parts = src.split(':');
    Some((parts.next()?.parse().ok()?, parts.next()?.parse().ok()?))
}

/// One entry per byte. A newline belongs to the line it terminates.
fn location_by_offset(content: &str) -> Vec<LineColumn> {
    let mut line = 1;
    let mut column = 0;
    content
        .bytes()
        .map(|byte| {
            column += 1;
            let location = LineColumn { line, column };
            if byte == b'\n' {
                line += 1;
                column = 0;
            }
            location
        })
        .collect()
}
