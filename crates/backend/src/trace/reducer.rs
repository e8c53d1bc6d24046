use std::collections::BTreeMap;

use alloy_primitives::U256;
use rustc_hash::FxHashMap;

use crate::{
    analysis::{
        ast::{function_name, Node, NodeId, NodeKind},
        source_map::JumpType,
        storage::{Assignment, Location},
        types::{DataLocation, Variable},
    },
    artifact::contract::Contracts,
    error::{Result, SdbError},
    trace::{
        context::{align, Alignment, Record},
        CallFrame, ContextAddress, Snapshot, Step, StepType, TraceInputs,
    },
};

/// Reduces a trace into source level steps.
pub fn reduce(contracts: &Contracts, inputs: &TraceInputs) -> Result<Vec<Step>> {
    TraceManager::new(contracts, inputs).reduce()
}

#[derive(Clone, Debug)]
struct Frame {
    call: CallFrame,
    /// The code execution context the function runs in.
    context: usize,
    /// Nodes of the function's subtree.
    nodes: Vec<NodeId>,
    /// Bindings of an outer invocation of the same function, restored on exit.
    shadowed: Vec<(NodeId, BTreeMap<NodeId, Assignment>)>,
}

/// The state of one trace reduction.
#[derive(Debug)]
pub struct TraceManager<'a> {
    contracts: &'a Contracts,
    inputs: &'a TraceInputs,

    /// Named call stack.
    frames: Vec<Frame>,
    /// Scope node to the variables declared in it, by variable id.
    scopes: BTreeMap<NodeId, BTreeMap<NodeId, Assignment>>,
    /// Storage seen so far, per storage address.
    storage: FxHashMap<ContextAddress, BTreeMap<U256, U256>>,
    /// Struct logs merged into `storage`.
    merged: usize,
    last_address: Option<ContextAddress>,
}

impl<'a> TraceManager<'a> {
    pub fn new(contracts: &'a Contracts, inputs: &'a TraceInputs) -> Self {
        Self {
            contracts,
            inputs,
            frames: Vec::new(),
            scopes: BTreeMap::new(),
            storage: FxHashMap::default(),
            merged: 0,
            last_address: None,
        }
    }

    pub fn reduce(mut self) -> Result<Vec<Step>> {
        let alignment = align(self.contracts, self.inputs)?;
        let classified = classify(&alignment.records);

        let mut steps = Vec::with_capacity(classified.len());
        let mut pending = classified.into_iter().peekable();
        for (position, record) in alignment.records.iter().enumerate() {
            self.register_local(record)?;

            while let Some((_, kind)) = pending.next_if(|(p, _)| *p == position) {
                self.merge_storage(&alignment, record.index);
                self.drop_unwound_frames(record);
                self.replay(record, kind, &mut steps)?;
            }
        }

        debug!(steps = steps.len(), frames = self.frames.len(), "reduced trace");
        Ok(steps)
    }

    fn replay(&mut self, record: &Record<'_>, kind: StepType, steps: &mut Vec<Step>) -> Result<()> {
        match kind {
            StepType::FunctionIn => {
                let Some(function) = record.function() else { return Ok(()) };
                self.enter_function(record, function)?;
                steps.push(self.step(record, kind));
            }
            StepType::FunctionOut if record.log.op == "RETURN" => {
                // leaves every function of the returning context
                if !self.frames.last().is_some_and(|frame| frame.context == record.context) {
                    trace!(index = record.index, "return without an active function");
                }
                while self.frames.last().is_some_and(|frame| frame.context == record.context) {
                    steps.push(self.step(record, kind));
                    self.pop_frame();
                }
            }
            StepType::FunctionOut => {
                let frame = self.frames.last().ok_or(SdbError::EmptyCallStack)?;
                let found = record.function().map(function_name).unwrap_or_default();
                if frame.call.function != found {
                    return Err(SdbError::FunctionExitMismatch {
                        expected: frame.call.function.clone(),
                        found,
                    });
                }
                steps.push(self.step(record, kind));
                self.pop_frame();
            }
            StepType::Jump | StepType::Line => steps.push(self.step(record, kind)),
        }
        Ok(())
    }

    fn step(&self, record: &Record<'_>, kind: StepType) -> Step {
        let assignments = match kind {
            StepType::FunctionOut => Vec::new(),
            _ => {
                let is_return = record.node.kind == NodeKind::Return;
                self.assignments_in_scope(record)
                    .into_iter()
                    .filter(|assignment| is_return || !assignment.variable.is_return())
                    .collect()
            }
        };

        Step {
            kind,
            calls: self.frames.iter().map(|frame| frame.call.clone()).collect(),
            assignments,
            file_name: record.range.file_name.clone(),
            location: record.range.location,
            node: record.node.id,
            address: record.storage_address,
            state: Snapshot {
                stack: record.log.stack.clone(),
                memory: record.log.memory.clone(),
                storage: self.storage.get(&record.storage_address).cloned().unwrap_or_default(),
            },
            index: record.index,
        }
    }

    /// Pushes a named frame and binds the parameters and return variables to the stack.
    fn enter_function(&mut self, record: &Record<'_>, function: &Node) -> Result<()> {
        let contract = record.contract;
        let ast = record.ast();

        if self.last_address != Some(record.storage_address) {
            for global in &contract.globals {
                self.bind(contract.node, global.clone());
                self.bind(global.variable.scope, global.clone());
            }
            self.last_address = Some(record.storage_address);
        }

        // set aside the bindings of a previous or still running call of the same function
        let nodes = ast.walk(function.id).into_iter().map(|node| node.id).collect::<Vec<_>>();
        let shadowed = nodes
            .iter()
            .filter_map(|id| self.scopes.remove(id).map(|vars| (*id, vars)))
            .collect();

        let name = function_name(function);
        trace!(index = record.index, contract = %contract.name, function = %name, "function entry");
        self.frames.push(Frame {
            call: CallFrame { address: record.storage_address, contract: contract.name.clone(), function: name },
            context: record.context,
            nodes,
            shadowed,
        });

        let parameters = ast.parameters(function.child("parameters"));
        let returns = ast.parameters(function.child("returnParameters"));
        let resolver = contract.resolver();
        let stack_len = record.log.stack.len();
        for (i, declaration) in returns.iter().rev().chain(parameters.iter().rev()).enumerate() {
            let Some(position) = stack_len.checked_sub(1 + i) else { break };
            let mut variable = resolver.variable(declaration)?;
            if variable.name.is_empty() {
                variable.name = format!("<{position}>");
            }
            self.bind(function.id, local_assignment(variable, position));
        }
        Ok(())
    }

    /// Binds a local variable the first time its declaration is executed.
    fn register_local(&mut self, record: &Record<'_>) -> Result<()> {
        let node = record.node;
        if node.kind != NodeKind::VariableDeclaration || node.attr_bool("stateVariable") {
            return Ok(());
        }
        let Some(scope) = node.scope().or_else(|| record.ast().parent(node.id)) else {
            return Ok(());
        };
        if self.scopes.get(&scope).is_some_and(|vars| vars.contains_key(&node.id)) {
            return Ok(());
        }

        let variable = record.contract.resolver().variable(node)?;
        trace!(index = record.index, name = %variable.name, "local variable");
        self.bind(scope, local_assignment(variable, record.log.stack.len()));
        Ok(())
    }

    fn bind(&mut self, scope: NodeId, assignment: Assignment) {
        self.scopes.entry(scope).or_default().insert(assignment.variable.id, assignment);
    }

    /// Variables declared in the scopes enclosing the record's node, ordered by declaration id.
    fn assignments_in_scope(&self, record: &Record<'_>) -> Vec<Assignment> {
        let mut found = BTreeMap::new();
        for ancestor in record.ast().ancestors(record.node.id) {
            let linked = record.contract.scopes.get(&ancestor).map(Vec::as_slice).unwrap_or_default();
            for scope in std::iter::once(&ancestor).chain(linked) {
                if let Some(vars) = self.scopes.get(scope) {
                    for (id, assignment) in vars {
                        found.entry(*id).or_insert(assignment);
                    }
                }
            }
        }
        found.into_values().cloned().collect()
    }

    /// Frames of contexts that were unwound without an exit (reverts, failed calls).
    fn drop_unwound_frames(&mut self, record: &Record<'_>) {
        while let Some(frame) = self.frames.last() {
            if record.active.contains(&frame.context) {
                break;
            }
            debug!(function = %frame.call.function, "dropping unwound frame");
            self.pop_frame();
        }
    }

    /// Pops the innermost named frame and brings back the bindings it shadowed.
    fn pop_frame(&mut self) {
        let Some(frame) = self.frames.pop() else { return };
        for id in &frame.nodes {
            self.scopes.remove(id);
        }
        self.scopes.extend(frame.shadowed);
    }

    /// Merges the storage reported by the struct logs up to `index`, per storage address.
    fn merge_storage(&mut self, alignment: &Alignment<'_>, index: usize) {
        let logs = &self.inputs.trace.struct_logs;
        while self.merged <= index && self.merged < logs.len() {
            if let Some(address) = alignment.storage_addresses.get(self.merged) {
                let storage = self.storage.entry(*address).or_default();
                storage.extend(logs[self.merged].storage.iter().map(|(k, v)| (*k, *v)));
            }
            self.merged += 1;
        }
    }
}

/// Where a local variable (or parameter) bound at a stack position lives.
fn local_assignment(variable: Variable, position: usize) -> Assignment {
    match variable.location {
        DataLocation::Memory => Assignment::new(variable, Location::Memory { position }),
        _ => Assignment::stack(variable, position),
    }
}

/// Second pass: picks the aligned instructions that become steps.
///
/// Exits take precedence over call sites, call sites over function entries, entries over
/// statements. A function entry is only taken once per call site: at the start of the trace,
/// and after a call site or a contract creation.
fn classify(records: &[Record<'_>]) -> Vec<(usize, StepType)> {
    let mut steps = Vec::new();
    let mut armed = true;

    for (position, record) in records.iter().enumerate() {
        let kind = record.node.kind;
        let jump = record.range.srcmap.jump;
        let next = records.get(position + 1).map(|next| next.node.kind);

        let step = if record.log.op == "RETURN" ||
            (jump == JumpType::Out &&
                kind != NodeKind::ContractDefinition &&
                record.function().is_some())
        {
            Some(StepType::FunctionOut)
        } else if (jump == JumpType::Into && kind == NodeKind::FunctionCall) || record.log.is_call() {
            armed = true;
            Some(StepType::Jump)
        } else if armed &&
            kind == NodeKind::FunctionDefinition &&
            next.is_some_and(|next| next != NodeKind::FunctionDefinition)
        {
            armed = false;
            Some(StepType::FunctionIn)
        } else if is_line(records, position) {
            Some(StepType::Line)
        } else {
            None
        };

        if record.log.is_create() {
            armed = true;
        }
        steps.extend(step.map(|step| (position, step)));
    }

    // the first function may have been entered before the first aligned instruction
    if let Some(&(position, first)) = steps.first() {
        if first != StepType::FunctionIn && records[position].function().is_some() {
            steps.insert(0, (position, StepType::FunctionIn));
        }
    }

    steps
}

fn is_line(records: &[Record<'_>], position: usize) -> bool {
    let record = &records[position];
    match record.node.kind {
        NodeKind::Assignment | NodeKind::VariableDeclarationStatement | NodeKind::Return => {
            position == 0 || records[position - 1].node.id != record.node.id
        }
        NodeKind::IfStatement |
        NodeKind::ForStatement |
        NodeKind::WhileStatement |
        NodeKind::DoWhileStatement => record.log.op == "JUMPI",
        _ => false,
    }
}
