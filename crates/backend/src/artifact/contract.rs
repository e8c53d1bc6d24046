use std::{collections::BTreeMap, sync::Arc};

use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::{
    analysis::{
        ast::{Ast, NodeId, NodeKind},
        source_map::{link_source_map, Bytecode},
        storage::{parse_storage, Assignment},
        types::{TypeResolver, UserTypes},
    },
    artifact::{
        source::{Source, Sources},
        ContractData,
    },
    error::{Result, SdbError},
    utils::bytecode::{matches_unlinked, normalize_bytecode, BytecodeId},
};

/// Everything the debugger knows about a compiled contract.
#[derive(Clone, Debug)]
pub struct Contract {
    pub name: String,
    pub creation: Bytecode,
    pub runtime: Bytecode,
    /// The `ContractDefinition` node.
    pub node: NodeId,
    /// All ASTs of the compilation the contract belongs to. Holds the parents index.
    pub ast: Arc<Ast>,
    /// Structs and enums declared in the contract and its bases.
    pub user_types: UserTypes,
    /// Structs and enums of the whole compilation.
    pub all_user_types: Arc<UserTypes>,
    /// Storage layout of the state variables, base contracts first.
    pub globals: Vec<Assignment>,
    pub slots: usize,
    /// Node id to the enclosing scopes recorded on the node: linearized base contracts for
    /// contracts, the `scope` field for declarations.
    pub scopes: FxHashMap<NodeId, Vec<NodeId>>,
    pub abi: Option<Value>,
}

impl Contract {
    pub fn resolver(&self) -> TypeResolver<'_> {
        TypeResolver::new(&self.ast, &self.all_user_types)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.ast.parent(id)
    }

    pub fn bytecode(&self, is_creation: bool) -> &Bytecode {
        if is_creation {
            &self.creation
        } else {
            &self.runtime
        }
    }
}

/// Builds the model of `data.contract_name`.
pub fn parse_contract(data: &ContractData, sources: &Sources) -> Result<Contract> {
    let mut ast = Ast::new();
    let mut files = BTreeMap::new();
    for (filename, source) in &data.sources {
        if !source.ast.is_null() && source.ast.get("nodeType").is_some() {
            ast.insert(&source.ast)?;
        }
        if let Some(file) = sources.get(filename) {
            files.insert(source.id, file.clone());
        }
    }
    let roots = ast.roots().to_vec();

    let definitions = roots
        .iter()
        .flat_map(|root| ast.walk_and_find(*root, NodeKind::ContractDefinition))
        .collect::<Vec<_>>();
    let by_id = definitions.iter().map(|node| (node.id, *node)).collect::<FxHashMap<_, _>>();
    let contract = *definitions
        .iter()
        .find(|node| node.name() == data.contract_name)
        .ok_or_else(|| SdbError::ContractNotFound(data.contract_name.clone()))?;

    let all_user_types = UserTypes::build(&ast, &roots)?;
    let resolver = TypeResolver::new(&ast, &all_user_types);

    // Base contracts first, each contract's variables in declaration order.
    let mut bases = Vec::new();
    let mut state_variables = Vec::new();
    for base in contract.attr_ids("linearizedBaseContracts").into_iter().rev() {
        let base = by_id.get(&base).ok_or_else(|| SdbError::ContractNotFound(base.to_string()))?;
        bases.push(base.name());

        let declarations = ast
            .walk_and_find(base.id, NodeKind::VariableDeclaration)
            .into_iter()
            .filter(|node| node.attr_bool("stateVariable"))
            .sorted_by_key(|node| node.id);
        for declaration in declarations {
            state_variables.push(resolver.variable(declaration)?);
        }
    }
    let layout = parse_storage(&state_variables);

    // When several nodes share a range the deepest one wins.
    let mut nodes_by_src = FxHashMap::default();
    let mut scopes = FxHashMap::default();
    for root in &roots {
        for node in ast.walk(*root) {
            nodes_by_src.insert(node.src.clone(), node.id);

            let mut node_scopes = node.attr_ids("linearizedBaseContracts");
            node_scopes.extend(node.scope());
            if !node_scopes.is_empty() {
                scopes.insert(node.id, node_scopes);
            }
        }
    }

    let creation = link_source_map(&data.source_map, &data.bytecode, &files, &nodes_by_src, true)?;
    let runtime =
        link_source_map(&data.source_map_runtime, &data.runtime_bytecode, &files, &nodes_by_src, false)?;

    debug!(
        contract = %data.contract_name,
        creation = %creation.id,
        runtime = %runtime.id,
        globals = layout.assignments.len(),
        "parsed contract"
    );

    Ok(Contract {
        name: data.contract_name.clone(),
        user_types: all_user_types.filter(&bases),
        node: contract.id,
        creation,
        runtime,
        globals: layout.assignments,
        slots: layout.slots,
        scopes,
        abi: data.abi.clone(),
        all_user_types: Arc::new(all_user_types),
        ast: Arc::new(ast),
    })
}

/// Builds the source table of all artifacts. Later artifacts win on duplicated file names.
pub fn parse_sources(data: &[ContractData]) -> Sources {
    let mut sources = Sources::new();
    for artifact in data {
        for (filename, source) in &artifact.sources {
            sources.insert(filename.clone(), Arc::new(Source::new(filename, source.source.as_str())));
        }
    }
    sources
}

/// The known contracts, indexed by name and by bytecode identity.
#[derive(Clone, Debug, Default)]
pub struct Contracts {
    contracts: BTreeMap<String, Arc<Contract>>,
    bytecodes: FxHashMap<BytecodeId, (String, bool)>,
}

impl Contracts {
    pub fn new(contracts: impl IntoIterator<Item = Contract>) -> Self {
        let mut this = Self::default();
        for contract in contracts {
            let contract = Arc::new(contract);
            for bytecode in [&contract.creation, &contract.runtime] {
                if normalize_bytecode(&bytecode.raw).is_empty() {
                    continue;
                }
                this.bytecodes
                    .entry(bytecode.id)
                    .or_insert_with(|| (contract.name.clone(), bytecode.is_creation));
            }
            this.contracts.insert(contract.name.clone(), contract);
        }
        this
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Contract>> {
        self.contracts.get(name).ok_or_else(|| SdbError::ContractNotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Contract>> {
        self.contracts.values()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// The contract and bytecode with the given identity.
    pub fn by_bytecode(&self, id: BytecodeId) -> Result<(&Arc<Contract>, &Bytecode)> {
        let (name, is_creation) =
            self.bytecodes.get(&id).ok_or_else(|| SdbError::BytecodeNotFound(id.to_string()))?;
        let contract = self.get(name)?;
        Ok((contract, contract.bytecode(*is_creation)))
    }

    /// Identifies on-chain (or transaction input) code.
    ///
    /// Falls back to comparing against unlinked artifacts with the link placeholders masked
    /// and, for creation code, to a prefix match which tolerates constructor arguments when
    /// the code has no metadata.
    pub fn identify(&self, code: &str) -> Result<BytecodeId> {
        let id = BytecodeId::from_hex(code);
        if self.bytecodes.contains_key(&id) {
            return Ok(id);
        }

        let normalized = normalize_bytecode(code);
        for contract in self.contracts.values() {
            for bytecode in [&contract.runtime, &contract.creation] {
                if !self.bytecodes.contains_key(&bytecode.id) {
                    continue;
                }
                if matches_unlinked(&bytecode.raw, code) ||
                    (bytecode.is_creation &&
                        normalized.starts_with(&normalize_bytecode(&bytecode.raw)))
                {
                    trace!(contract = %contract.name, "identified code by masked comparison");
                    return Ok(bytecode.id);
                }
            }
        }

        Err(SdbError::BytecodeNotFound(id.to_string()))
    }
}

/// Builds the models of all artifacts, and the source table.
pub fn parse_contract_data(data: &[ContractData]) -> Result<(Contracts, Sources)> {
    let sources = parse_sources(data);
    let contracts = data.iter().map(|artifact| parse_contract(artifact, &sources)).collect::<Result<Vec<_>>>()?;
    Ok((Contracts::new(contracts), sources))
}
