//! Fixtures shared by the unit tests: an in-memory data provider, hand-assembled artifacts and
//! the struct-log traces executing them.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc,
    },
};

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::{json, Value as Json};

use crate::{
    analysis::{
        ast::NodeId,
        source_map::SingleFileSourceRange,
        types::{DataLocation, Mutability, TypeName, Variable},
    },
    artifact::{ContractData, SourceData},
    error::{Result, SdbError},
    provider::DataProvider,
    state::State,
    trace::{ContextAddress, ExecutionTrace, Snapshot, Step, StepType, StructLog, TraceInputs, TransactionInfo},
};

pub(crate) const SAMPLE_ADDRESS: Address = Address::repeat_byte(0x5a);
pub(crate) const LOOP_ADDRESS: Address = Address::repeat_byte(0x10);
pub(crate) const CALL_CHAIN_TX: B256 = B256::repeat_byte(0xcc);
pub(crate) const LOOP_TX: B256 = B256::repeat_byte(0x11);
pub(crate) const CALLER_ADDRESS: Address = Address::repeat_byte(0xca);
pub(crate) const EOA_ADDRESS: Address = Address::repeat_byte(0xe0);
pub(crate) const CALLER_TX: B256 = B256::repeat_byte(0xca);

/// A [`DataProvider`] answering from maps. Unknown storage slots hold `slot + 1`.
#[derive(Debug, Default)]
pub(crate) struct MockProvider {
    pub codes: FxHashMap<Address, String>,
    pub txs: FxHashMap<B256, TransactionInfo>,
    pub traces: FxHashMap<B256, ExecutionTrace>,
    pub storage: FxHashMap<(Address, U256), U256>,
    storage_reads: AtomicUsize,
}

impl MockProvider {
    /// Serves the transaction, trace and codes of `inputs`.
    pub fn with_inputs(mut self, inputs: &TraceInputs) -> Self {
        self.txs.insert(inputs.tx.hash, inputs.tx.clone());
        self.traces.insert(inputs.tx.hash, inputs.trace.clone());
        self.codes.extend(inputs.codes.iter().map(|(address, code)| (*address, code.clone())));
        self
    }

    pub fn storage_reads(&self) -> usize {
        self.storage_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    async fn get_code(&self, address: Address) -> Result<String> {
        Ok(self.codes.get(&address).cloned().unwrap_or_else(|| "0x".to_string()))
    }

    async fn get_transaction_by_hash(&self, hash: B256) -> Result<TransactionInfo> {
        self.txs.get(&hash).cloned().ok_or_else(|| SdbError::UnresolvedTarget(hash.to_string()))
    }

    async fn debug_trace_transaction(&self, hash: B256) -> Result<ExecutionTrace> {
        self.traces.get(&hash).cloned().ok_or_else(|| SdbError::Provider(format!("no trace for {hash}")))
    }

    async fn get_storage_at(&self, address: Address, slot: U256, _block: u64) -> Result<U256> {
        self.storage_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.storage.get(&(address, slot)).copied().unwrap_or(slot + U256::from(1)))
    }
}

static NEXT_VARIABLE_ID: AtomicI64 = AtomicI64::new(10_000);

/// A mutable stack variable of the given type.
pub(crate) fn var(name: &str, ty: TypeName) -> Variable {
    Variable {
        id: NodeId(NEXT_VARIABLE_ID.fetch_add(1, Ordering::Relaxed)),
        name: name.to_string(),
        location: DataLocation::Stack,
        bytes: ty.bytes(),
        ty,
        scope: NodeId(0),
        state: false,
        mutability: Mutability::Mutable,
        value: None,
    }
}

pub(crate) fn step_with(address: ContextAddress, state: Snapshot) -> Step {
    Step {
        kind: StepType::Line,
        calls: Vec::new(),
        assignments: Vec::new(),
        file_name: String::new(),
        location: SingleFileSourceRange::default(),
        node: NodeId(0),
        address,
        state,
        index: 0,
    }
}

/// A state applied to `snapshot` of a deployed contract, backed by a [`MockProvider`].
pub(crate) fn state_with(snapshot: Snapshot) -> State {
    let mut state = State::new(Arc::new(MockProvider::default()), 1, false);
    state.apply(&step_with(ContextAddress::Deployed(Address::repeat_byte(0x42)), snapshot));
    state
}

/// Source text with `offset:length:0` lookups of its fragments.
struct Text(String);

impl Text {
    fn offset(&self, needle: &str) -> usize {
        self.0.find(needle).unwrap_or_else(|| panic!("`{needle}` not in source"))
    }

    fn span(&self, needle: &str) -> String {
        format!("{}:{}:0", self.offset(needle), needle.len())
    }

    /// Span of `needle` searched inside `parent`.
    fn span_in(&self, parent: &str, needle: &str) -> String {
        let inner = parent.find(needle).unwrap_or_else(|| panic!("`{needle}` not in `{parent}`"));
        format!("{}:{}:0", self.offset(parent) + inner, needle.len())
    }
}

fn elementary(id: i64, name: &str, src: String) -> Json {
    json!({ "id": id, "nodeType": "ElementaryTypeName", "src": src, "name": name })
}

fn declaration(id: i64, name: &str, ty: Json, scope: i64, state: bool, src: String) -> Json {
    json!({
        "id": id, "nodeType": "VariableDeclaration", "src": src, "name": name,
        "stateVariable": state, "storageLocation": "default", "mutability": "mutable",
        "constant": false, "scope": scope, "typeName": ty
    })
}

fn parameter_list(id: i64, parameters: Vec<Json>, src: String) -> Json {
    json!({ "id": id, "nodeType": "ParameterList", "src": src, "parameters": parameters })
}

fn function(id: i64, name: &str, scope: i64, src: String, parameters: Json, returns: Json, body: Json) -> Json {
    json!({
        "id": id, "nodeType": "FunctionDefinition", "src": src, "name": name, "kind": "function",
        "scope": scope, "visibility": "public",
        "parameters": parameters, "returnParameters": returns, "body": body
    })
}

fn identifier(id: i64, name: &str, src: String) -> Json {
    json!({ "id": id, "nodeType": "Identifier", "src": src, "name": name })
}

/// A statement-only call `name(n);`.
fn call_statement(id: i64, text: &Text, function: &str, name: &str) -> Json {
    let statement = format!("{name}(n);");
    let call = format!("{name}(n)");
    let argument = text.offset(function) + function.find(&call).unwrap_or_default() + name.len() + 1;
    json!({
        "id": id, "nodeType": "ExpressionStatement", "src": text.span_in(function, &statement),
        "expression": {
            "id": id + 1, "nodeType": "FunctionCall", "src": text.span_in(function, &call),
            "expression": identifier(id + 2, name, text.span_in(function, &format!("{name}("))),
            "arguments": [identifier(id + 3, "n", format!("{argument}:1:0"))]
        }
    })
}

pub(crate) fn log(pc: usize, op: &str, stack: &[u64]) -> StructLog {
    StructLog {
        pc,
        op: op.to_string(),
        depth: 1,
        stack: stack.iter().map(|word| U256::from(*word)).collect(),
        ..Default::default()
    }
}

fn source_map(entries: &[(String, char)]) -> String {
    entries.iter().map(|(span, jump)| format!("{span}:{jump}")).collect::<Vec<_>>().join(";")
}

const XX: &str = "function xx(uint n) internal {\n        x = n;\n    }";
const SET: &str = "function set(uint n) public {\n        other(n);\n    }";
const OTHER: &str = "function other(uint n) internal {\n        xx(n);\n    }";

fn call_chain_text() -> (Text, String, String) {
    let other = format!("contract Other {{\n    uint x;\n\n    {XX}\n}}");
    let sample = format!("contract Sample is Other {{\n    uint y;\n\n    {SET}\n\n    {OTHER}\n}}");
    (Text(format!("{other}\n\n{sample}\n")), other, sample)
}

/// `Sample is Other`, where `set(n)` calls `other(n)` which calls the inherited `xx(n)`, and
/// `xx` stores `n` into `Other.x`.
pub(crate) fn call_chain_artifact() -> ContractData {
    let (text, other, sample) = call_chain_text();
    let uint = |id, parent: &str, needle: &str| elementary(id, "uint", text.span_in(parent, needle));

    let ast = json!({
        "id": 100, "nodeType": "SourceUnit", "src": format!("0:{}:0", text.0.len()),
        "absolutePath": "Sample.sol",
        "nodes": [
            {
                "id": 1, "nodeType": "ContractDefinition", "src": text.span(&other), "name": "Other",
                "contractKind": "contract", "linearizedBaseContracts": [1], "scope": 100,
                "nodes": [
                    declaration(2, "x", uint(3, &other, "uint"), 1, true, text.span("uint x")),
                    function(
                        4, "xx", 1, text.span(XX),
                        parameter_list(5, vec![
                            declaration(6, "n", uint(7, XX, "uint"), 4, false, text.span_in(XX, "uint n")),
                        ], text.span_in(XX, "(uint n)")),
                        parameter_list(8, vec![], text.span_in(XX, " internal")),
                        json!({
                            "id": 9, "nodeType": "Block", "src": text.span_in(XX, "{\n        x = n;\n    }"),
                            "statements": [{
                                "id": 10, "nodeType": "ExpressionStatement", "src": text.span_in(XX, "x = n;"),
                                "expression": {
                                    "id": 11, "nodeType": "Assignment", "src": text.span_in(XX, "x = n"),
                                    "operator": "=",
                                    "leftHandSide": identifier(12, "x", text.span_in(XX, "x = n").replace(":5:", ":1:")),
                                    "rightHandSide": identifier(13, "n", text.span_in(XX, "n;"))
                                }
                            }]
                        }),
                    ),
                ]
            },
            {
                "id": 20, "nodeType": "ContractDefinition", "src": text.span(&sample), "name": "Sample",
                "contractKind": "contract", "linearizedBaseContracts": [20, 1], "scope": 100,
                "baseContracts": [{
                    "id": 21, "nodeType": "InheritanceSpecifier", "src": text.span_in(&sample, "Other"),
                    "baseName": { "id": 22, "nodeType": "IdentifierPath", "src": text.span_in(&sample, "Other"), "name": "Other" }
                }],
                "nodes": [
                    declaration(23, "y", uint(24, &sample, "uint"), 20, true, text.span("uint y")),
                    function(
                        25, "set", 20, text.span(SET),
                        parameter_list(26, vec![
                            declaration(27, "n", uint(28, SET, "uint"), 25, false, text.span_in(SET, "uint n")),
                        ], text.span_in(SET, "(uint n)")),
                        parameter_list(29, vec![], text.span_in(SET, " public")),
                        json!({
                            "id": 30, "nodeType": "Block", "src": text.span_in(SET, "{\n        other(n);\n    }"),
                            "statements": [call_statement(31, &text, SET, "other")]
                        }),
                    ),
                    function(
                        40, "other", 20, text.span(OTHER),
                        parameter_list(41, vec![
                            declaration(42, "n", uint(43, OTHER, "uint"), 40, false, text.span_in(OTHER, "uint n")),
                        ], text.span_in(OTHER, "(uint n)")),
                        parameter_list(44, vec![], text.span_in(OTHER, " internal")),
                        json!({
                            "id": 45, "nodeType": "Block", "src": text.span_in(OTHER, "{\n        xx(n);\n    }"),
                            "statements": [call_statement(46, &text, OTHER, "xx")]
                        }),
                    ),
                ]
            }
        ]
    });

    // JUMPDEST JUMP JUMPDEST JUMP JUMPDEST SSTORE JUMP JUMP JUMP STOP
    let runtime_map = source_map(&[
        (text.span(SET), '-'),
        (text.span_in(SET, "other(n)"), 'i'),
        (text.span(OTHER), '-'),
        (text.span_in(OTHER, "xx(n)"), 'i'),
        (text.span(XX), '-'),
        (text.span_in(XX, "x = n"), '-'),
        (text.span(XX), 'o'),
        (text.span(OTHER), 'o'),
        (text.span(SET), 'o'),
        ("-1:-1:-1".to_string(), '-'),
    ]);

    ContractData {
        contract_name: "Sample".to_string(),
        bytecode: "0x6080604052348015600f57600080fd5b50".to_string(),
        source_map: String::new(),
        runtime_bytecode: "0x5b565b565b5556565600".to_string(),
        source_map_runtime: runtime_map,
        sources: BTreeMap::from([(
            "Sample.sol".to_string(),
            SourceData { id: 0, ast, source: text.0.clone() },
        )]),
        abi: None,
    }
}

/// A call of `Sample.set(5)`.
pub(crate) fn call_chain_inputs() -> TraceInputs {
    const SEL: u64 = 0x60fe47b1;
    let mut logs = vec![
        log(0, "JUMPDEST", &[SEL, 5]),
        log(1, "JUMP", &[SEL, 5, 8, 5, 2]),
        log(2, "JUMPDEST", &[SEL, 5, 8, 5]),
        log(3, "JUMP", &[SEL, 5, 8, 5, 7, 5, 4]),
        log(4, "JUMPDEST", &[SEL, 5, 8, 5, 7, 5]),
        log(5, "SSTORE", &[SEL, 5, 8, 5, 7, 5, 5, 0]),
        log(6, "JUMP", &[SEL, 5, 8, 5, 7]),
        log(7, "JUMP", &[SEL, 5, 8]),
        log(8, "JUMP", &[SEL, 9]),
        log(9, "STOP", &[SEL]),
    ];
    for log in &mut logs[5..] {
        log.storage.insert(U256::ZERO, U256::from(5));
    }

    let tx = TransactionInfo {
        hash: CALL_CHAIN_TX,
        to: Some(SAMPLE_ADDRESS),
        input: Bytes::from_static(&[0x60, 0xfe, 0x47, 0xb1]),
        block_number: Some(U64::from(10)),
    };
    let codes = FxHashMap::from_iter([(SAMPLE_ADDRESS, call_chain_artifact().runtime_bytecode)]);
    TraceInputs::new(tx, ExecutionTrace { failed: false, struct_logs: logs }, codes)
}

const RUN: &str =
    "function run(uint n) public {\n        for (int i = 0; i < int(n); i++) {\n            o = i + 1;\n        }\n    }";
const FOR: &str = "for (int i = 0; i < int(n); i++) {\n            o = i + 1;\n        }";

/// `Loop.run(n)` counting `i` from 0 to `n` and storing `i + 1` into `o`.
pub(crate) fn loop_artifact() -> ContractData {
    let contract = format!("contract Loop {{\n    int o;\n\n    {RUN}\n}}");
    let text = Text(format!("{contract}\n"));

    let ast = json!({
        "id": 200, "nodeType": "SourceUnit", "src": format!("0:{}:0", text.0.len()),
        "absolutePath": "Loop.sol",
        "nodes": [{
            "id": 201, "nodeType": "ContractDefinition", "src": text.span(&contract), "name": "Loop",
            "contractKind": "contract", "linearizedBaseContracts": [201], "scope": 200,
            "nodes": [
                declaration(202, "o", elementary(203, "int", text.span_in(&contract, "int")), 201, true, text.span("int o")),
                function(
                    204, "run", 201, text.span(RUN),
                    parameter_list(205, vec![
                        declaration(
                            206, "n", elementary(207, "uint", text.span_in(RUN, "uint")), 204, false,
                            text.span_in(RUN, "uint n"),
                        ),
                    ], text.span_in(RUN, "(uint n)")),
                    parameter_list(208, vec![], text.span_in(RUN, " public")),
                    json!({
                        "id": 209, "nodeType": "Block", "src": text.span_in(RUN, "{\n        for"),
                        "statements": [{
                            "id": 210, "nodeType": "ForStatement", "src": text.span(FOR),
                            "initializationExpression": {
                                "id": 211, "nodeType": "VariableDeclarationStatement",
                                "src": text.span_in(FOR, "int i = 0;"),
                                "declarations": [declaration(
                                    212, "i", elementary(213, "int", text.span_in(FOR, "int")), 210, false,
                                    text.span_in(FOR, "int i"),
                                )],
                                "initialValue": {
                                    "id": 214, "nodeType": "Literal", "src": text.span_in(FOR, "0;"),
                                    "kind": "number", "value": "0"
                                }
                            },
                            "condition": {
                                "id": 215, "nodeType": "BinaryOperation", "src": text.span_in(FOR, "i < int(n)"),
                                "operator": "<"
                            },
                            "loopExpression": {
                                "id": 216, "nodeType": "ExpressionStatement", "src": text.span_in(FOR, "i++"),
                                "expression": {
                                    "id": 217, "nodeType": "UnaryOperation", "src": text.span_in(FOR, "i++"),
                                    "operator": "++"
                                }
                            },
                            "body": {
                                "id": 218, "nodeType": "Block", "src": text.span_in(FOR, "{\n            o"),
                                "statements": [{
                                    "id": 219, "nodeType": "ExpressionStatement",
                                    "src": text.span_in(FOR, "o = i + 1;"),
                                    "expression": {
                                        "id": 220, "nodeType": "Assignment", "src": text.span_in(FOR, "o = i + 1"),
                                        "operator": "="
                                    }
                                }]
                            }
                        }]
                    }),
                ),
            ]
        }]
    });

    // JUMPDEST PUSH1 00 JUMPDEST JUMPDEST JUMPI SSTORE JUMP JUMP STOP
    let runtime_map = source_map(&[
        (text.span(RUN), '-'),
        (text.span_in(FOR, "int i"), '-'),
        (text.span_in(FOR, "int i = 0;"), '-'),
        (text.span(FOR), '-'),
        (text.span(FOR), '-'),
        (text.span_in(FOR, "o = i + 1"), '-'),
        (text.span_in(FOR, "i++"), '-'),
        (text.span(RUN), 'o'),
        ("-1:-1:-1".to_string(), '-'),
    ]);

    ContractData {
        contract_name: "Loop".to_string(),
        bytecode: "0x6080604052600080fd".to_string(),
        source_map: String::new(),
        runtime_bytecode: "0x5b60005b5b5755565600".to_string(),
        source_map_runtime: runtime_map,
        sources: BTreeMap::from([(
            "Loop.sol".to_string(),
            SourceData { id: 0, ast, source: text.0.clone() },
        )]),
        abi: None,
    }
}

/// A call of `Loop.run(3)`.
pub(crate) fn loop_inputs() -> TraceInputs {
    const SEL: u64 = 0xc0406226;
    let mut logs = vec![
        log(0, "JUMPDEST", &[SEL, 3]),
        log(1, "PUSH1", &[SEL, 3]),
        log(3, "JUMPDEST", &[SEL, 3, 0]),
    ];
    for i in 0..3 {
        logs.push(log(4, "JUMPDEST", &[SEL, 3, i]));
        logs.push(log(5, "JUMPI", &[SEL, 3, i, 1, 6]));
        let mut store = log(6, "SSTORE", &[SEL, 3, i, i + 1, 0]);
        store.storage.insert(U256::ZERO, U256::from(i + 1));
        logs.push(store);
        logs.push(log(7, "JUMP", &[SEL, 3, i + 1, 4]));
    }
    logs.push(log(4, "JUMPDEST", &[SEL, 3, 3]));
    logs.push(log(5, "JUMPI", &[SEL, 3, 3, 0, 6]));
    logs.push(log(8, "JUMP", &[SEL, 3, 3, 10]));
    logs.push(log(9, "STOP", &[SEL]));

    let tx = TransactionInfo {
        hash: LOOP_TX,
        to: Some(LOOP_ADDRESS),
        input: Bytes::from_static(&[0xc0, 0x40, 0x62, 0x26]),
        block_number: Some(U64::from(20)),
    };
    let codes = FxHashMap::from_iter([(LOOP_ADDRESS, loop_artifact().runtime_bytecode)]);
    TraceInputs::new(tx, ExecutionTrace { failed: false, struct_logs: logs }, codes)
}

const GO: &str = "function go() public {\n        sample.set(5);\n        lib.delegatecall(data);\n        \
                  sample.set(6);\n        eoa.call(\"\");\n        new Sample();\n    }";

fn call_expression(id: i64, text: &Text, call: &str) -> Json {
    json!({
        "id": id, "nodeType": "ExpressionStatement", "src": text.span(&format!("{call};")),
        "expression": { "id": id + 1, "nodeType": "FunctionCall", "src": text.span(call) }
    })
}

/// `Caller.go()`: calls `Sample.set(5)`, delegates to `Loop`, calls `Sample.set(6)` which
/// reverts, calls an account without code and deploys a `Sample`.
pub(crate) fn caller_artifact() -> ContractData {
    let contract = format!("contract Caller {{\n    {GO}\n}}");
    let text = Text(format!("{contract}\n"));

    let ast = json!({
        "id": 300, "nodeType": "SourceUnit", "src": format!("0:{}:0", text.0.len()),
        "absolutePath": "Caller.sol",
        "nodes": [{
            "id": 301, "nodeType": "ContractDefinition", "src": text.span(&contract), "name": "Caller",
            "contractKind": "contract", "linearizedBaseContracts": [301], "scope": 300,
            "nodes": [function(
                302, "go", 301, text.span(GO),
                parameter_list(303, vec![], text.span_in(GO, "()")),
                parameter_list(304, vec![], text.span_in(GO, " public")),
                json!({
                    "id": 305, "nodeType": "Block", "src": text.span_in(GO, "{\n        sample"),
                    "statements": [
                        call_expression(306, &text, "sample.set(5)"),
                        call_expression(308, &text, "lib.delegatecall(data)"),
                        call_expression(310, &text, "sample.set(6)"),
                        call_expression(312, &text, "eoa.call(\"\")"),
                        {
                            "id": 314, "nodeType": "ExpressionStatement", "src": text.span("new Sample();"),
                            "expression": {
                                "id": 315, "nodeType": "FunctionCall", "src": text.span("new Sample()"),
                                "expression": {
                                    "id": 316, "nodeType": "NewExpression", "src": text.span("new Sample"),
                                    "typeName": {
                                        "id": 317, "nodeType": "UserDefinedTypeName",
                                        "src": text.span_in("new Sample", "Sample"),
                                        "typeDescriptions": { "typeString": "contract Sample" }
                                    }
                                }
                            }
                        }
                    ]
                }),
            )]
        }]
    });

    // JUMPDEST CALL DELEGATECALL CALL CALL CREATE RETURN
    let runtime_map = source_map(&[
        (text.span(GO), '-'),
        (text.span("sample.set(5)"), '-'),
        (text.span("lib.delegatecall(data)"), '-'),
        (text.span("sample.set(6)"), '-'),
        (text.span("eoa.call(\"\")"), '-'),
        (text.span("new Sample();"), '-'),
        (text.span(GO), '-'),
    ]);

    ContractData {
        contract_name: "Caller".to_string(),
        bytecode: "0x608060405261004e".to_string(),
        source_map: String::new(),
        runtime_bytecode: "0x5bf1f4f1f1f0f3".to_string(),
        source_map_runtime: runtime_map,
        sources: BTreeMap::from([(
            "Caller.sol".to_string(),
            SourceData { id: 0, ast, source: text.0.clone() },
        )]),
        abi: None,
    }
}

/// A message call instruction of `Caller` targeting `to`.
fn call_log(pc: usize, op: &str, to: Address) -> StructLog {
    let mut log = log(pc, op, &[0, 0, 0, 0, 0]);
    log.stack.push(U256::from_be_slice(to.as_slice()));
    log.stack.push(U256::from(100_000));
    log
}

fn nested(logs: Vec<StructLog>) -> impl Iterator<Item = StructLog> {
    logs.into_iter().map(|mut log| {
        log.depth = 2;
        log
    })
}

/// A call of `Caller.go()`. The nested frames replay the `Sample.set(5)` and `Loop.run(3)`
/// traces one level deeper.
pub(crate) fn caller_inputs() -> TraceInputs {
    const SEL: u64 = 0x0f59f83a;
    const SET_SEL: u64 = 0x60fe47b1;

    let mut logs = vec![log(0, "JUMPDEST", &[SEL]), call_log(1, "CALL", SAMPLE_ADDRESS)];
    logs.extend(nested(call_chain_inputs().trace.struct_logs));
    logs.push(call_log(2, "DELEGATECALL", LOOP_ADDRESS));
    logs.extend(nested(loop_inputs().trace.struct_logs));
    logs.push(call_log(3, "CALL", SAMPLE_ADDRESS));
    // `set(6)` reverts inside `other`
    logs.extend(nested(vec![
        log(0, "JUMPDEST", &[SET_SEL, 6]),
        log(1, "JUMP", &[SET_SEL, 6, 8, 6, 2]),
        log(2, "JUMPDEST", &[SET_SEL, 6, 8, 6]),
        log(9, "REVERT", &[SET_SEL, 6, 8, 6, 0, 0]),
    ]));
    logs.push(call_log(4, "CALL", EOA_ADDRESS));
    // init code assembled at runtime, unknown to the artifacts
    let mut create = log(5, "CREATE", &[SEL, 4, 0, 0]);
    create.memory = vec![0xde, 0xad, 0xbe, 0xef];
    logs.push(create);
    logs.extend(nested(vec![log(0, "PUSH1", &[]), log(2, "RETURN", &[0, 0])]));
    logs.push(log(6, "RETURN", &[SEL, 0, 0]));

    let tx = TransactionInfo {
        hash: CALLER_TX,
        to: Some(CALLER_ADDRESS),
        input: Bytes::from_static(&[0x0f, 0x59, 0xf8, 0x3a]),
        block_number: Some(U64::from(30)),
    };
    let codes = FxHashMap::from_iter([
        (CALLER_ADDRESS, caller_artifact().runtime_bytecode),
        (SAMPLE_ADDRESS, call_chain_artifact().runtime_bytecode),
        (LOOP_ADDRESS, loop_artifact().runtime_bytecode),
    ]);
    TraceInputs::new(tx, ExecutionTrace { failed: false, struct_logs: logs }, codes)
}
