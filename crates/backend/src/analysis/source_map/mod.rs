//! Source maps: parsing the compressed per-instruction format and linking it, through the
//! opcode table and the AST, into a program counter indexed map of [`SourceRange`]s.

use std::{collections::BTreeMap, fmt, sync::Arc};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::ast::NodeId,
    artifact::source::{LineColumn, Source},
    error::{Result, SdbError},
    utils::{
        bytecode::{decode_hex, zero_placeholders, BytecodeId},
        opcode::PcIcMap,
    },
};

/// The jump annotation of a source map entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpType {
    /// `i`: jump into a function.
    Into,
    /// `o`: return from a function.
    Out,
    /// `-`: any other instruction.
    #[default]
    Regular,
}

impl JumpType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "i" => Some(Self::Into),
            "o" => Some(Self::Out),
            "-" => Some(Self::Regular),
            _ => None,
        }
    }
}

impl fmt::Display for JumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Self::Into => "i",
            Self::Out => "o",
            Self::Regular => "-",
        };
        f.write_str(c)
    }
}

/// A resolved source map entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub offset: usize,
    pub length: usize,
    pub file_index: i64,
    pub jump: JumpType,
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self { offset: 0, length: 0, file_index: -1, jump: JumpType::Regular }
    }
}

impl SourceLocation {
    /// The `offset:length:fileIndex` key AST nodes are indexed by.
    pub fn position(&self) -> String {
        format!("{}:{}:{}", self.offset, self.length, self.file_index)
    }
}

/// Parses a compressed source map into one entry per instruction index.
///
/// Empty fields repeat the value of the previous entry. Entries that resolve to file `-1`
/// (compiler generated code) are `None`.
pub fn parse_src_map(src_map: &str) -> Result<Vec<Option<SourceLocation>>> {
    let mut last = SourceLocation::default();

    src_map
        .split(';')
        .map(|entry| {
            let err = |reason: &str| SdbError::SourceMap {
                entry: entry.to_string(),
                reason: reason.to_string(),
            };

            let mut fields = entry.split(':');
            // Some compilers emit `-1` offsets and lengths for generated code.
            if let Some(offset) = fields.next().filter(|f| !f.is_empty()) {
                last.offset = offset.parse::<i64>().map_err(|_| err("invalid offset"))?.max(0) as usize;
            }
            if let Some(length) = fields.next().filter(|f| !f.is_empty()) {
                last.length = length.parse::<i64>().map_err(|_| err("invalid length"))?.max(0) as usize;
            }
            if let Some(file_index) = fields.next().filter(|f| !f.is_empty()) {
                last.file_index = file_index.parse().map_err(|_| err("invalid file index"))?;
            }
            if let Some(jump) = fields.next().filter(|f| !f.is_empty()) {
                last.jump = JumpType::parse(jump).ok_or_else(|| err("invalid jump type"))?;
            }
            // A trailing modifier depth field may follow; it carries nothing we need.

            Ok((last.file_index != -1).then_some(last))
        })
        .collect()
}

/// Start and end of a source range. The end is missing when the range reaches the end of
/// the file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleFileSourceRange {
    pub start: Option<LineColumn>,
    pub end: Option<LineColumn>,
}

impl SingleFileSourceRange {
    /// Whether the range starts and ends on the same line.
    pub fn is_line(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start.line == end.line)
    }

    pub fn start_line(&self) -> Option<usize> {
        self.start.map(|start| start.line)
    }
}

/// What the instruction at a program counter maps to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRange {
    pub location: SingleFileSourceRange,
    pub srcmap: SourceLocation,
    pub file_name: String,
    pub opcode: Option<&'static str>,
    /// `offset:length:fileIndex`.
    pub position: String,
    pub node: NodeId,
}

pub type SourceMap = BTreeMap<usize, SourceRange>;

/// A compiled bytecode together with its program counter to source mapping.
#[derive(Clone, Debug)]
pub struct Bytecode {
    pub is_creation: bool,
    pub id: BytecodeId,
    pub source: SourceMap,
    pub raw: String,
}

impl Bytecode {
    pub fn get(&self, pc: usize) -> Option<&SourceRange> {
        self.source.get(&pc)
    }
}

/// Links a source map to its bytecode and to the AST.
///
/// Program counters whose entry is compiler generated or matches no AST node are dropped.
pub fn link_source_map(
    src_map: &str,
    bytecode: &str,
    files: &BTreeMap<i64, Arc<Source>>,
    nodes_by_src: &FxHashMap<String, NodeId>,
    is_creation: bool,
) -> Result<Bytecode> {
    let code = decode_hex(&zero_placeholders(bytecode))?;
    let pc_ic_map = PcIcMap::new(&code);
    let entries = parse_src_map(src_map)?;

    let mut source = SourceMap::new();
    for (pc, instruction) in pc_ic_map.iter_sorted() {
        let Some(Some(srcmap)) = entries.get(instruction.index) else { continue };

        let position = srcmap.position();
        let Some(node) = nodes_by_src.get(&position) else { continue };

        let (file_name, location) = match files.get(&srcmap.file_index) {
            Some(file) => (
                file.filename.clone(),
                SingleFileSourceRange {
                    start: file.location(srcmap.offset),
                    end: file.location(srcmap.offset + srcmap.length),
                },
            ),
            None => (String::new(), SingleFileSourceRange::default()),
        };

        source.insert(
            pc,
            SourceRange {
                location,
                srcmap: *srcmap,
                file_name,
                opcode: instruction.mnemonic,
                position,
                node: *node,
            },
        );
    }

    trace!(
        is_creation,
        instructions = pc_ic_map.len(),
        mapped = source.len(),
        "linked source map"
    );

    Ok(Bytecode { is_creation, id: BytecodeId::from_hex(bytecode), source, raw: bytecode.to_string() })
}
