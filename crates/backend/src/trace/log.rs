//! The JSON-RPC shapes a trace is reduced from.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{Result, SdbError},
    utils::bytecode::{decode_hex, strip_hex_prefix},
};

/// One executed instruction of a `debug_traceTransaction` result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStructLog", into = "RawStructLog")]
pub struct StructLog {
    pub pc: usize,
    pub op: String,
    /// Call depth, 1 for the transaction's own frame.
    pub depth: u64,
    /// Bottom first.
    pub stack: Vec<U256>,
    pub memory: Vec<u8>,
    /// Slots the node reports for the executing storage address. Not always complete.
    pub storage: BTreeMap<U256, U256>,
    pub error: Option<String>,
}

impl StructLog {
    /// The `n`-th word from the top of the stack.
    pub fn peek(&self, n: usize) -> Option<U256> {
        self.stack.len().checked_sub(n + 1).map(|i| self.stack[i])
    }

    pub fn is_call(&self) -> bool {
        matches!(self.op.as_str(), "CALL" | "CALLCODE" | "DELEGATECALL" | "STATICCALL")
    }

    pub fn is_create(&self) -> bool {
        matches!(self.op.as_str(), "CREATE" | "CREATE2")
    }

    /// Whether the executing frame ends with this instruction.
    pub fn is_halt(&self) -> bool {
        self.error.is_some() ||
            matches!(self.op.as_str(), "RETURN" | "STOP" | "REVERT" | "INVALID" | "SELFDESTRUCT")
    }

    /// Memory bytes `[offset, offset + size)`, zero filled past the end of the buffer.
    pub fn memory_slice(&self, offset: usize, size: usize) -> Vec<u8> {
        let mut res = vec![0; size];
        if offset < self.memory.len() {
            let end = self.memory.len().min(offset.saturating_add(size));
            res[..end - offset].copy_from_slice(&self.memory[offset..end]);
        }
        res
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStructLog {
    pc: usize,
    op: String,
    #[serde(default)]
    depth: u64,
    #[serde(default)]
    stack: Option<Vec<String>>,
    #[serde(default)]
    memory: Option<Vec<String>>,
    #[serde(default)]
    storage: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

/// Parses a hex encoded word, with or without `0x` and leading zeros.
pub fn parse_word(s: &str) -> Result<U256> {
    let digits = strip_hex_prefix(s);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|err| SdbError::decode(format!("invalid word `{s}`: {err}")))
}

impl TryFrom<RawStructLog> for StructLog {
    type Error = SdbError;

    fn try_from(raw: RawStructLog) -> Result<Self> {
        let stack = raw.stack.unwrap_or_default().iter().map(|word| parse_word(word)).collect::<Result<_>>()?;
        let memory = decode_hex(&raw.memory.unwrap_or_default().concat())?;
        let storage = raw
            .storage
            .unwrap_or_default()
            .iter()
            .map(|(slot, value)| Ok((parse_word(slot)?, parse_word(value)?)))
            .collect::<Result<_>>()?;
        let error = raw.error.filter(|err| !err.is_null()).map(|err| match err {
            Value::String(err) => err,
            err => err.to_string(),
        });

        Ok(Self { pc: raw.pc, op: raw.op, depth: raw.depth, stack, memory, storage, error })
    }
}

impl From<StructLog> for RawStructLog {
    fn from(log: StructLog) -> Self {
        let word = |w: &U256| hex::encode(w.to_be_bytes::<32>());
        Self {
            pc: log.pc,
            op: log.op,
            depth: log.depth,
            stack: Some(log.stack.iter().map(|w| format!("0x{w:x}")).collect()),
            memory: Some(log.memory.chunks(32).map(hex::encode).collect()),
            storage: Some(log.storage.iter().map(|(k, v)| (word(k), word(v))).collect()),
            error: log.error.map(Value::String),
        }
    }
}

/// A `debug_traceTransaction` result with the default struct logger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    #[serde(default)]
    pub failed: bool,
    pub struct_logs: Vec<StructLog>,
}

/// The transaction fields a trace reduction needs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub hash: B256,
    /// Missing (or zero) for contract creations.
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub input: Bytes,
    /// Missing while the transaction is pending.
    #[serde(default)]
    pub block_number: Option<U64>,
}

impl TransactionInfo {
    /// The deployed contract the transaction calls, `None` for contract creations.
    pub fn target(&self) -> Option<Address> {
        self.to.filter(|to| !to.is_zero())
    }
}
