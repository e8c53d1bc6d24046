use std::fmt;

use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Markers opening the CBOR metadata blob solc appends to the code. Everything from the first
/// marker on (metadata, then constructor arguments for creation code) is left out of the identity.
const METADATA_MARKERS: [&str; 4] = [
    "a165627a7a72",   // bzzr0
    "a265627a7a72",   // bzzr1
    "a2646970667358", // ipfs
    "a264736f6c63",   // solc version only
];

/// Length in hex chars of a library link placeholder (`__$<hash>$__` or `__Name___...`).
const PLACEHOLDER_LEN: usize = 40;

/// A content-derived identifier of a bytecode, independent of library addresses, the library
/// self-address guard, compiler metadata and appended constructor arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BytecodeId(pub B256);

impl BytecodeId {
    /// Computes the identifier of a hex encoded bytecode (with or without `0x`, possibly
    /// unlinked).
    pub fn from_hex(code: &str) -> Self {
        Self(keccak256(normalize_bytecode(code).as_bytes()))
    }

    /// Computes the identifier of raw bytecode.
    pub fn from_bytes(code: &[u8]) -> Self {
        Self::from_hex(&hex::encode(code))
    }

    /// A short form used in tables and logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for BytecodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// Strips the `0x` prefix, if any.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

/// Normalizes hex bytecode for identity purposes.
pub fn normalize_bytecode(code: &str) -> String {
    let mut code = strip_hex_prefix(code).to_ascii_lowercase();

    code = zero_placeholders(&code);

    // Libraries push their own address first: PUSH20 <address> ADDRESS EQ.
    if code.len() >= 46 && code.starts_with("73") && &code[42..46] == "3014" {
        code.replace_range(2..42, &"0".repeat(40));
    }

    // Metadata only ever appears at an instruction boundary near the end, but creation code
    // contains the runtime code (and its metadata) first, so the earliest marker wins.
    if let Some(pos) = METADATA_MARKERS.iter().filter_map(|m| find_even(&code, m)).min() {
        code.truncate(pos);
    }

    code
}

/// Returns the positions (in hex chars) of all link placeholders.
pub fn placeholder_positions(code: &str) -> Vec<usize> {
    let code = strip_hex_prefix(code);
    let bytes = code.as_bytes();
    let mut positions = Vec::new();
    let mut i = 0;
    while i + PLACEHOLDER_LEN <= bytes.len() {
        if bytes[i] == b'_' && bytes[i + 1] == b'_' {
            positions.push(i);
            i += PLACEHOLDER_LEN;
        } else {
            i += 2;
        }
    }
    positions
}

/// Compares unlinked artifact code against deployed code, ignoring placeholder positions and
/// everything after the metadata marker.
pub fn matches_unlinked(artifact: &str, deployed: &str) -> bool {
    let positions = placeholder_positions(artifact);
    let artifact = normalize_bytecode(artifact);
    let mut deployed = strip_hex_prefix(deployed).to_ascii_lowercase();
    for pos in &positions {
        if pos + PLACEHOLDER_LEN <= deployed.len() {
            deployed.replace_range(*pos..pos + PLACEHOLDER_LEN, &"0".repeat(PLACEHOLDER_LEN));
        }
    }
    normalize_bytecode(&deployed) == artifact
}

/// Decodes hex (with or without `0x`). Odd lengths are left padded.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = strip_hex_prefix(s.trim());
    if s.len() % 2 == 1 {
        Ok(hex::decode(format!("0{s}"))?)
    } else {
        Ok(hex::decode(s)?)
    }
}

/// Replaces link placeholders by zero addresses, making unlinked code decodable.
pub fn zero_placeholders(code: &str) -> String {
    let code = strip_hex_prefix(code);
    let mut out = code.to_string();
    for pos in placeholder_positions(code) {
        out.replace_range(pos..pos + PLACEHOLDER_LEN, &"0".repeat(PLACEHOLDER_LEN));
    }
    out
}

/// Finds `needle` at a byte-aligned (even) position.
fn find_even(haystack: &str, needle: &str) -> Option<usize> {
    haystack.match_indices(needle).map(|(i, _)| i).find(|i| i % 2 == 0)
}
