use crate::error::Result;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Block height or the moving chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl Display for BlockTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockTag::Latest => write!(f, "latest"),
            BlockTag::Number(number) => write!(f, "{number}"),
        }
    }
}

impl BlockTag {
    /// JSON-RPC block parameter.
    pub fn to_rpc_param(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Number(number) => format!("0x{number:x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    pub number: u64,
    pub timestamp: i64,
}

/// A single storage word of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocator {
    pub address: Address,
    pub slot: B256,
}

impl Display for StorageLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.address, self.slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topics: Vec<B256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: B256,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Read-only access to the ledger. Implementations report recoverable
/// failures as [`crate::SyncError::TransientRead`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_storage_at(&self, locator: &StorageLocator, block: u64) -> Result<U256>;

    async fn get_block(&self, tag: BlockTag) -> Result<BlockMeta>;

    /// Logs in `[from_block, to_block]`, in chain order.
    async fn get_logs(&self, from_block: u64, to_block: u64, filter: &LogFilter) -> Result<Vec<RawLog>>;
}
