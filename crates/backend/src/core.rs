use std::{path::PathBuf, sync::Arc};

use alloy_primitives::B256;
use sdb_utils::{init_progress, update_progress};

use crate::{
    artifact::{
        contract::{parse_contract, parse_sources, Contracts},
        source::Sources,
        ContractData,
    },
    error::{Result, SdbError},
    provider::{DataProvider, RpcProvider},
    session::Session,
    trace::{reduce, Step, TraceInputs},
};

#[derive(Debug, Default)]
pub struct DebuggerBuilder {
    provider: Option<Arc<dyn DataProvider>>,
    rpc_url: Option<String>,
    cache_root: Option<PathBuf>,
    no_cache: bool,
    storage_nocache: bool,
    artifacts: Vec<ContractData>,
}

impl DebuggerBuilder {
    /// Set the data provider.
    /// If not set, a JSON-RPC provider for the rpc url is used.
    pub fn provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the url of the JSON-RPC endpoint.
    pub fn rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }

    /// Set the cache root directory.
    /// If not set, the default cache directory will be used.
    pub fn cache_root(mut self, path: PathBuf) -> Self {
        self.cache_root = Some(path);
        self
    }

    /// Do not cache transactions and traces on disk.
    pub fn no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    /// Read every storage slot from the node instead of the trace.
    pub fn storage_nocache(mut self, storage_nocache: bool) -> Self {
        self.storage_nocache = storage_nocache;
        self
    }

    /// Add compiled artifacts.
    pub fn artifacts(mut self, artifacts: impl IntoIterator<Item = ContractData>) -> Self {
        self.artifacts.extend(artifacts);
        self
    }

    /// Build the debugger.
    pub fn build(self) -> Result<Debugger> {
        debug!(
            rpc_url = ?self.rpc_url,
            cache_root = ?self.cache_root,
            artifacts = self.artifacts.len(),
            "building debugger"
        );

        let provider = match (self.provider, self.rpc_url) {
            (Some(provider), _) => provider,
            (None, Some(rpc_url)) => {
                let provider = RpcProvider::new(&rpc_url)?;
                if self.no_cache {
                    Arc::new(provider)
                } else {
                    Arc::new(provider.with_cache(self.cache_root)?)
                }
            }
            (None, None) => return Err(SdbError::Provider("no data provider configured".to_string())),
        };

        let sources = parse_sources(&self.artifacts);
        let pb = init_progress!(self.artifacts, "Parsing contracts");
        let mut contracts = Vec::with_capacity(self.artifacts.len());
        for (index, artifact) in self.artifacts.iter().enumerate() {
            contracts.push(parse_contract(artifact, &sources)?);
            update_progress!(pb, index);
        }
        pb.finish_and_clear();

        Ok(Debugger {
            provider,
            contracts: Contracts::new(contracts),
            sources,
            storage_nocache: self.storage_nocache,
        })
    }
}

/// The known contracts and a data provider to debug transactions with.
#[derive(Debug)]
pub struct Debugger {
    provider: Arc<dyn DataProvider>,
    contracts: Contracts,
    sources: Sources,
    storage_nocache: bool,
}

impl Debugger {
    pub fn builder() -> DebuggerBuilder {
        DebuggerBuilder::default()
    }

    pub fn contracts(&self) -> &Contracts {
        &self.contracts
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    /// Lines of `file_name` a breakpoint can be set on.
    pub fn checkpoints(&self, file_name: &str) -> Vec<usize> {
        let Some(source) = self.sources.get(file_name) else { return Vec::new() };
        let mut lines = self
            .contracts
            .iter()
            .flat_map(|contract| {
                contract
                    .ast
                    .roots()
                    .iter()
                    .filter(|root| {
                        contract.ast.get(**root).and_then(|node| node.attr_str("absolutePath")) ==
                            Some(file_name)
                    })
                    .flat_map(|root| source.checkpoints(&contract.ast, *root))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    /// Fetches and reduces the trace of a transaction.
    pub async fn trace(&self, hash: B256) -> Result<Vec<Step>> {
        let inputs = TraceInputs::fetch(self.provider.as_ref(), hash).await?;
        reduce(&self.contracts, &inputs)
    }

    /// A session over the steps of a transaction.
    pub async fn debug(&self, hash: B256) -> Result<Session> {
        let inputs = TraceInputs::fetch(self.provider.as_ref(), hash).await?;
        let steps = reduce(&self.contracts, &inputs)?;
        Session::new(self.provider.clone(), self.sources.clone(), inputs.tx, steps, self.storage_nocache)
    }
}
