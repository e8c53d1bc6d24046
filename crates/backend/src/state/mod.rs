//! The decode-time view of a step: its stack, memory and storage, backed by the node for
//! storage slots the trace did not report.

mod decode;
mod value;

use std::{collections::BTreeMap, sync::Arc};

use alloy_primitives::U256;

pub use self::value::Value;
use crate::{
    error::{Result, SdbError},
    provider::DataProvider,
    trace::{ContextAddress, Snapshot, Step},
};

#[derive(Debug)]
pub struct State {
    provider: Arc<dyn DataProvider>,
    /// Block whose post-state precedes the transaction.
    block: u64,
    /// Read every storage slot from the node.
    nocache: bool,

    snapshot: Snapshot,
    address: Option<ContextAddress>,
    /// Slots fetched from the node for `address`.
    cache: BTreeMap<U256, U256>,
}

impl State {
    pub fn new(provider: Arc<dyn DataProvider>, block: u64, nocache: bool) -> Self {
        Self {
            provider,
            block,
            nocache,
            snapshot: Snapshot::default(),
            address: None,
            cache: BTreeMap::new(),
        }
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    pub fn address(&self) -> Option<ContextAddress> {
        self.address
    }

    /// Points the state at the snapshot of `step`.
    pub fn apply(&mut self, step: &Step) {
        if self.address != Some(step.address) {
            trace!(address = %step.address, "storage cache reset");
            self.cache.clear();
            self.address = Some(step.address);
        }
        self.snapshot = step.state.clone();
    }

    /// The stack word at `position`, counted from the bottom.
    pub fn stack(&self, position: usize) -> Result<U256> {
        self.snapshot.stack.get(position).copied().ok_or_else(|| {
            SdbError::decode(format!(
                "stack position {position} out of bounds ({} words)",
                self.snapshot.stack.len()
            ))
        })
    }

    pub fn memory(&self) -> &[u8] {
        &self.snapshot.memory
    }

    /// Reads a storage slot of the current address.
    pub async fn storage(&mut self, slot: U256) -> Result<U256> {
        let address = self.address.ok_or_else(|| SdbError::decode("no step applied"))?;

        if let (true, Some(address)) = (self.nocache, address.address()) {
            return self.provider.get_storage_at(address, slot, self.block).await;
        }
        if let Some(value) = self.snapshot.storage.get(&slot) {
            return Ok(*value);
        }
        // nothing of a contract under construction is on chain
        let Some(address) = address.address() else { return Ok(U256::ZERO) };
        if let Some(value) = self.cache.get(&slot) {
            trace!(%slot, "storage cache hit");
            return Ok(*value);
        }

        let value = self.provider.get_storage_at(address, slot, self.block).await?;
        self.cache.insert(slot, value);
        Ok(value)
    }
}
