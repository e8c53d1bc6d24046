//! Remote chain data: the [`DataProvider`] seam and its JSON-RPC implementation.

use std::{borrow::Cow, fmt::Debug, path::PathBuf};

use alloy_primitives::{Address, B256, U256};
use alloy_provider::{Provider, ReqwestProvider};
use alloy_transport::TransportError;
use alloy_transport_http::reqwest::Url;
use async_trait::async_trait;
use sdb_utils::cache::{Cache, CachePath};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{Result, SdbError},
    trace::{ExecutionTrace, TransactionInfo},
};

/// Everything the debugger reads from a node.
#[async_trait]
pub trait DataProvider: Send + Sync + Debug {
    /// Deployed code at `address`, hex encoded. `0x` for accounts without code.
    async fn get_code(&self, address: Address) -> Result<String>;

    async fn get_transaction_by_hash(&self, hash: B256) -> Result<TransactionInfo>;

    /// Opcode level trace of a mined transaction.
    async fn debug_trace_transaction(&self, hash: B256) -> Result<ExecutionTrace>;

    async fn get_storage_at(&self, address: Address, slot: U256, block: u64) -> Result<U256>;
}

impl From<TransportError> for SdbError {
    fn from(err: TransportError) -> Self {
        Self::Provider(err.to_string())
    }
}

/// A [`DataProvider`] over JSON-RPC, caching transactions and traces on disk.
#[derive(Debug, Clone)]
pub struct RpcProvider {
    inner: ReqwestProvider,
    tx_cache: Cache<TransactionInfo>,
    trace_cache: Cache<ExecutionTrace>,
}

impl RpcProvider {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: Url =
            rpc_url.parse().map_err(|err| SdbError::Provider(format!("invalid rpc url `{rpc_url}`: {err}")))?;
        Ok(Self {
            inner: ReqwestProvider::new_http(url),
            tx_cache: Cache::disabled(),
            trace_cache: Cache::disabled(),
        })
    }

    /// Enables the disk cache under `cache_root` (`~/.sdb/cache` when `None`).
    pub fn with_cache(mut self, cache_root: Option<PathBuf>) -> Result<Self> {
        let path = CachePath::new(cache_root);
        let cache_err = |err: eyre::Report| SdbError::Provider(format!("cannot create cache: {err}"));
        self.tx_cache = Cache::new(path.sdb_tx_cache_dir(), None).map_err(cache_err)?;
        self.trace_cache = Cache::new(path.sdb_trace_cache_dir(), None).map_err(cache_err)?;
        Ok(self)
    }

    /// Sends a request. A `null` response is `None`.
    async fn request_opt<P, R>(&self, method: &'static str, params: P) -> Result<Option<R>>
    where
        P: Serialize + Clone + Debug + Send + Sync + Unpin + 'static,
        R: DeserializeOwned,
    {
        trace!(method, ?params, "rpc request");
        let response: Value = self.inner.raw_request(Cow::Borrowed(method), params).await?;
        if response.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(response)?))
    }

    async fn request<P, R>(&self, method: &'static str, params: P) -> Result<R>
    where
        P: Serialize + Clone + Debug + Send + Sync + Unpin + 'static,
        R: DeserializeOwned,
    {
        self.request_opt(method, params)
            .await?
            .ok_or_else(|| SdbError::Provider(format!("{method} returned null")))
    }

    fn save<T: Serialize + DeserializeOwned>(cache: &Cache<T>, label: String, data: &T) {
        if let Err(err) = cache.save_cache(label, data) {
            warn!(%err, "cannot write the rpc cache");
        }
    }
}

#[async_trait]
impl DataProvider for RpcProvider {
    async fn get_code(&self, address: Address) -> Result<String> {
        self.request("eth_getCode", (address, "latest")).await
    }

    async fn get_transaction_by_hash(&self, hash: B256) -> Result<TransactionInfo> {
        if let Some(tx) = self.tx_cache.load_cache(hash.to_string()) {
            return Ok(tx);
        }

        let tx: TransactionInfo = self
            .request_opt("eth_getTransactionByHash", (hash,))
            .await?
            .ok_or_else(|| SdbError::UnresolvedTarget(hash.to_string()))?;
        // pending transactions may still change
        if tx.block_number.is_some() {
            Self::save(&self.tx_cache, hash.to_string(), &tx);
        }
        Ok(tx)
    }

    async fn debug_trace_transaction(&self, hash: B256) -> Result<ExecutionTrace> {
        if let Some(trace) = self.trace_cache.load_cache(hash.to_string()) {
            return Ok(trace);
        }

        let trace: ExecutionTrace = self
            .request("debug_traceTransaction", (hash, json!({ "enableMemory": true })))
            .await?;
        Self::save(&self.trace_cache, hash.to_string(), &trace);
        Ok(trace)
    }

    async fn get_storage_at(&self, address: Address, slot: U256, block: u64) -> Result<U256> {
        let value: String =
            self.request("eth_getStorageAt", (address, slot, format!("{block:#x}"))).await?;
        crate::trace::parse_word(&value)
    }
}
