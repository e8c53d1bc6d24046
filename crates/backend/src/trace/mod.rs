//! Reduction of opcode level traces into source level steps.
//!
//! Remote data is fetched once, up front, into [`TraceInputs`]. Everything after that is a pure
//! function of the inputs and the known contracts: [`TraceManager`] aligns every struct log with
//! the source map of the code executing it, classifies the aligned instructions and replays them
//! to rebuild the named call stack and the variables in scope.

mod context;
mod inputs;
mod log;
mod reducer;

use std::{collections::BTreeMap, fmt};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

pub use self::{
    inputs::TraceInputs,
    log::{parse_word, ExecutionTrace, StructLog, TransactionInfo},
    reducer::{reduce, TraceManager},
};
use crate::analysis::{ast::NodeId, source_map::SingleFileSourceRange, storage::Assignment};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
pub enum StepType {
    FunctionIn,
    FunctionOut,
    /// A call site: an internal function call or a message call.
    Jump,
    /// A statement.
    Line,
}

/// The account whose code (or storage) a frame runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContextAddress {
    Deployed(Address),
    /// Code being deployed, by the index of the struct log that started the creation (0 for
    /// the transaction itself). The address is not known while the constructor runs.
    Creation(usize),
}

impl ContextAddress {
    pub fn address(&self) -> Option<Address> {
        match self {
            Self::Deployed(address) => Some(*address),
            Self::Creation(_) => None,
        }
    }
}

impl fmt::Display for ContextAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployed(address) => write!(f, "{address}"),
            Self::Creation(index) => write!(f, "(contract creation, step {index})"),
        }
    }
}

/// A function on the named call stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    pub address: ContextAddress,
    pub contract: String,
    pub function: String,
}

/// Raw machine state captured with a step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub stack: Vec<U256>,
    pub memory: Vec<u8>,
    /// Every slot seen so far for the executing storage address.
    pub storage: BTreeMap<U256, U256>,
}

/// A source level step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub kind: StepType,
    /// Named call stack, outermost first.
    pub calls: Vec<CallFrame>,
    pub assignments: Vec<Assignment>,
    pub file_name: String,
    pub location: SingleFileSourceRange,
    pub node: NodeId,
    /// The storage address the snapshot belongs to.
    pub address: ContextAddress,
    pub state: Snapshot,
    /// Index of the struct log the step was taken at.
    pub index: usize,
}

impl Step {
    pub fn line(&self) -> Option<usize> {
        self.location.start_line()
    }
}
