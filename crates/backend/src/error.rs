use thiserror::Error;

use crate::analysis::ast::NodeId;

pub type Result<T, E = SdbError> = std::result::Result<T, E>;

/// Errors raised by the backend.
///
/// Lookup, consistency and type-resolution errors abort the operation in progress. Only
/// [`SdbError::Decode`] is recovered from, one variable at a time.
#[derive(Debug, Error)]
pub enum SdbError {
    #[error("bytecode {0} not found among the known contracts")]
    BytecodeNotFound(String),
    #[error("contract {0} not found")]
    ContractNotFound(String),
    #[error("cannot resolve the target of transaction {0}")]
    UnresolvedTarget(String),
    #[error("transaction {0} is not mined yet")]
    PendingTransaction(String),
    #[error("ast node {0} not found")]
    NodeNotFound(NodeId),
    #[error("source file with index {0} not found")]
    SourceNotFound(i64),

    #[error("function exit mismatch: expected `{expected}`, found `{found}`")]
    FunctionExitMismatch { expected: String, found: String },
    #[error("function exit without an active function")]
    EmptyCallStack,
    #[error("{0} call context(s) still active at the end of the trace")]
    DanglingContexts(usize),

    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("unknown user-defined type: {0}")]
    UnknownUserType(String),

    #[error("invalid source map entry `{entry}`: {reason}")]
    SourceMap { entry: String, reason: String },
    #[error("malformed ast: {0}")]
    Ast(String),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl SdbError {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
