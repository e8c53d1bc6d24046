//! First pass: follows the message call contexts through the struct logs and aligns every
//! instruction with the source map of the code executing it.

use std::sync::Arc;

use alloy_primitives::{Address, U256};

use crate::{
    analysis::{
        ast::{Ast, Node, NodeKind},
        source_map::SourceRange,
    },
    artifact::contract::{Contract, Contracts},
    error::{Result, SdbError},
    trace::{ContextAddress, StructLog, TraceInputs},
    utils::bytecode::{normalize_bytecode, BytecodeId},
};

pub(crate) fn word_to_address(word: U256) -> Address {
    Address::from_slice(&word.to_be_bytes::<32>()[12..])
}

/// A frame of code execution.
#[derive(Clone, Copy, Debug)]
struct Context {
    /// Unique among the contexts of a trace.
    id: usize,
    bytecode: BytecodeId,
    storage_address: ContextAddress,
    /// Depth of the struct logs executed by this context.
    depth: u64,
}

/// An instruction the source map knows about.
#[derive(Clone, Debug)]
pub(crate) struct Record<'a> {
    /// Index of the struct log.
    pub index: usize,
    pub log: &'a StructLog,
    pub contract: &'a Arc<Contract>,
    pub range: &'a SourceRange,
    pub node: &'a Node,
    /// The executing context.
    pub context: usize,
    pub storage_address: ContextAddress,
    /// Active contexts, outermost first.
    pub active: Vec<usize>,
}

impl Record<'_> {
    pub fn ast(&self) -> &Ast {
        &self.contract.ast
    }

    /// The function definition the instruction belongs to.
    pub fn function(&self) -> Option<&Node> {
        self.ast().enclosing(self.node.id, NodeKind::FunctionDefinition)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Alignment<'a> {
    pub records: Vec<Record<'a>>,
    /// Storage address executing each struct log.
    pub storage_addresses: Vec<ContextAddress>,
}

struct Aligner<'a> {
    contracts: &'a Contracts,
    inputs: &'a TraceInputs,
    contexts: Vec<Context>,
    next_id: usize,
}

impl<'a> Aligner<'a> {
    fn push(&mut self, bytecode: BytecodeId, storage_address: ContextAddress, depth: u64) {
        let id = self.next_id;
        self.next_id += 1;
        debug!(id, bytecode = %bytecode.short(), address = %storage_address, depth, "enter context");
        self.contexts.push(Context { id, bytecode, storage_address, depth });
    }

    fn pop(&mut self, reason: &str) {
        if let Some(context) = self.contexts.pop() {
            debug!(id = context.id, address = %context.storage_address, reason, "leave context");
        }
    }

    fn initial_context(&mut self, depth: u64) -> Result<()> {
        let tx = &self.inputs.tx;
        match tx.target() {
            None => {
                let bytecode = self.contracts.identify(&hex::encode_prefixed(&tx.input))?;
                self.push(bytecode, ContextAddress::Creation(0), depth);
            }
            Some(to) => {
                let code = self
                    .inputs
                    .codes
                    .get(&to)
                    .filter(|code| !normalize_bytecode(code).is_empty())
                    .ok_or_else(|| SdbError::UnresolvedTarget(tx.hash.to_string()))?;
                let bytecode = self.contracts.identify(code)?;
                self.push(bytecode, ContextAddress::Deployed(to), depth);
            }
        }
        Ok(())
    }

    /// The context entered by a message call, `None` when the target has no code.
    fn enter_call(&mut self, log: &StructLog, current: Context) -> Result<()> {
        let Some(target) = log.peek(1).map(word_to_address) else { return Ok(()) };
        let code = self.inputs.codes.get(&target).map(String::as_str).unwrap_or_default();
        if normalize_bytecode(code).is_empty() {
            trace!(%target, op = %log.op, "call to an account without code");
            return Ok(());
        }

        let bytecode = self.contracts.identify(code)?;
        let storage_address = match log.op.as_str() {
            "DELEGATECALL" | "CALLCODE" => current.storage_address,
            _ => ContextAddress::Deployed(target),
        };
        self.push(bytecode, storage_address, log.depth + 1);
        Ok(())
    }

    /// The context running the init code of a `CREATE`/`CREATE2`.
    fn enter_create(&mut self, index: usize, log: &StructLog, record: Option<&Record<'_>>) -> Result<()> {
        let offset = log.peek(1).unwrap_or_default().saturating_to::<usize>();
        let size = log
            .peek(2)
            .unwrap_or_default()
            .saturating_to::<usize>()
            .min(log.memory.len().saturating_sub(offset));
        let init_code = hex::encode_prefixed(log.memory_slice(offset, size));

        let bytecode = match self.contracts.identify(&init_code) {
            Ok(bytecode) => bytecode,
            Err(err) => {
                // init code built at runtime, fall back to the `new` expression
                let name = record
                    .and_then(|record| new_expression_contract(record.ast(), record.node))
                    .ok_or(err)?;
                self.contracts.get(&name)?.creation.id
            }
        };
        self.push(bytecode, ContextAddress::Creation(index), log.depth + 1);
        Ok(())
    }
}

/// Name of the contract a `new` expression under `node` deploys.
fn new_expression_contract(ast: &Ast, node: &Node) -> Option<String> {
    let expression = ast.walk(node.id).into_iter().find(|node| node.kind == NodeKind::NewExpression)?;
    let type_name = ast.get(expression.child("typeName")?)?;
    match type_name.type_string().and_then(|ty| ty.strip_prefix("contract ")) {
        Some(name) => Some(name.to_string()),
        None => Some(type_name.name().to_string()).filter(|name| !name.is_empty()),
    }
}

/// Aligns the struct logs of a trace with the source maps of the known contracts.
pub(crate) fn align<'a>(contracts: &'a Contracts, inputs: &'a TraceInputs) -> Result<Alignment<'a>> {
    let logs = &inputs.trace.struct_logs;
    let mut aligner = Aligner { contracts, inputs, contexts: Vec::new(), next_id: 0 };
    aligner.initial_context(logs.first().map_or(1, |log| log.depth))?;

    let mut alignment = Alignment::default();
    for (index, log) in logs.iter().enumerate() {
        // frames left without a halting instruction: calls that never ran code, out of gas, ...
        while aligner.contexts.last().is_some_and(|context| context.depth > log.depth) {
            aligner.pop("depth decreased");
        }
        let Some(&context) = aligner.contexts.last() else {
            warn!(index, "struct logs past the end of the transaction");
            break;
        };
        alignment.storage_addresses.push(context.storage_address);

        let (contract, bytecode) = contracts.by_bytecode(context.bytecode)?;
        if let Some(range) = bytecode.get(log.pc) {
            alignment.records.push(Record {
                index,
                log,
                contract,
                range,
                node: contract.ast.node(range.node)?,
                context: context.id,
                storage_address: context.storage_address,
                active: aligner.contexts.iter().map(|context| context.id).collect(),
            });
        }

        if log.is_halt() {
            aligner.pop(&log.op);
        } else if log.is_call() {
            aligner.enter_call(log, context)?;
        } else if log.is_create() {
            let record = alignment.records.last().filter(|record| record.index == index);
            aligner.enter_create(index, log, record)?;
        }
    }

    if !aligner.contexts.is_empty() {
        return Err(SdbError::DanglingContexts(aligner.contexts.len()));
    }

    debug!(logs = logs.len(), aligned = alignment.records.len(), "aligned trace");
    Ok(alignment)
}
