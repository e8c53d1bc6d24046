use alloy_primitives::{Address, B256};
use rustc_hash::FxHashMap;

use crate::{
    error::Result,
    provider::DataProvider,
    trace::{context::word_to_address, ExecutionTrace, TransactionInfo},
};

/// Everything a reduction reads from the chain.
#[derive(Clone, Debug, Default)]
pub struct TraceInputs {
    pub tx: TransactionInfo,
    pub trace: ExecutionTrace,
    /// Deployed code of the transaction target and of every message call target.
    pub codes: FxHashMap<Address, String>,
}

impl TraceInputs {
    pub fn new(tx: TransactionInfo, trace: ExecutionTrace, codes: FxHashMap<Address, String>) -> Self {
        Self { tx, trace, codes }
    }

    /// Fetches the transaction, its trace and the code of the accounts it calls.
    pub async fn fetch(provider: &dyn DataProvider, hash: B256) -> Result<Self> {
        let tx = provider.get_transaction_by_hash(hash).await?;
        let trace = provider.debug_trace_transaction(hash).await?;

        let mut targets = Vec::new();
        targets.extend(tx.target());
        for log in trace.struct_logs.iter().filter(|log| log.is_call()) {
            targets.extend(log.peek(1).map(word_to_address));
        }

        let mut codes = FxHashMap::default();
        for address in targets {
            if codes.contains_key(&address) {
                continue;
            }
            let code = provider.get_code(address).await?;
            trace!(%address, size = code.len(), "fetched code");
            codes.insert(address, code);
        }

        debug!(%hash, logs = trace.struct_logs.len(), accounts = codes.len(), "fetched trace inputs");
        Ok(Self { tx, trace, codes })
    }
}
