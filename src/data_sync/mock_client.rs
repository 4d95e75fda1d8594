use crate::data_sync::client::{BlockMeta, BlockTag, LedgerClient, LogFilter, RawLog, StorageLocator};
use crate::error::{Result, SyncError};
use alloy_primitives::U256;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Evenly spaced chain used when a block has no explicit entry.
#[derive(Debug, Clone, Copy)]
struct LinearChain {
    head: u64,
    head_timestamp: i64,
    seconds_per_block: f64,
}

#[derive(Debug, Default)]
struct MockState {
    storage: HashMap<StorageLocator, U256>,
    blocks: BTreeMap<u64, i64>,
    chain: Option<LinearChain>,
    logs: Vec<RawLog>,
    failing_storage_reads: u32,
    failing_logs_from: Option<u64>,
    storage_calls: u32,
    block_calls: u32,
    log_requests: Vec<(u64, u64)>,
}

/// Scripted in-memory ledger for tests.
#[derive(Debug, Default)]
pub struct MockLedgerClient {
    state: Mutex<MockState>,
}

impl MockLedgerClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_storage(&self, locator: StorageLocator, word: U256) {
        self.state().storage.insert(locator, word);
    }

    pub fn push_block(&self, block: BlockMeta) {
        self.state().blocks.insert(block.number, block.timestamp);
    }

    pub fn set_linear_chain(&self, head: u64, head_timestamp: i64, seconds_per_block: f64) {
        self.state().chain = Some(LinearChain { head, head_timestamp, seconds_per_block });
    }

    pub fn push_log(&self, log: RawLog) {
        self.state().logs.push(log);
    }

    pub fn fail_next_storage_reads(&self, count: u32) {
        self.state().failing_storage_reads = count;
    }

    pub fn fail_logs_from(&self, from_block: Option<u64>) {
        self.state().failing_logs_from = from_block;
    }

    pub fn storage_calls(&self) -> u32 {
        self.state().storage_calls
    }

    pub fn block_calls(&self) -> u32 {
        self.state().block_calls
    }

    pub fn log_requests(&self) -> Vec<(u64, u64)> {
        self.state().log_requests.clone()
    }

    fn head(state: &MockState) -> Option<u64> {
        let explicit = state.blocks.keys().next_back().copied();
        match (explicit, state.chain) {
            (Some(a), Some(chain)) => Some(a.max(chain.head)),
            (a, chain) => a.or(chain.map(|c| c.head)),
        }
    }

    fn timestamp_of(state: &MockState, number: u64) -> Option<i64> {
        if let Some(timestamp) = state.blocks.get(&number) {
            return Some(*timestamp);
        }
        let chain = state.chain?;
        if number > chain.head {
            return None;
        }
        Some(chain.head_timestamp - ((chain.head - number) as f64 * chain.seconds_per_block) as i64)
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn get_storage_at(&self, locator: &StorageLocator, _block: u64) -> Result<U256> {
        let mut state = self.state();
        state.storage_calls += 1;
        if state.failing_storage_reads > 0 {
            state.failing_storage_reads -= 1;
            return Err(SyncError::TransientRead("connection reset".to_string()));
        }
        Ok(state.storage.get(locator).copied().unwrap_or_default())
    }

    async fn get_block(&self, tag: BlockTag) -> Result<BlockMeta> {
        let mut state = self.state();
        state.block_calls += 1;
        let number = match tag {
            BlockTag::Latest => Self::head(&state).ok_or_else(|| SyncError::TransientRead("empty chain".to_string()))?,
            BlockTag::Number(number) => number,
        };
        let timestamp = Self::timestamp_of(&state, number).ok_or(SyncError::BlockNotFound(number))?;
        Ok(BlockMeta { number, timestamp })
    }

    async fn get_logs(&self, from_block: u64, to_block: u64, filter: &LogFilter) -> Result<Vec<RawLog>> {
        let mut state = self.state();
        state.log_requests.push((from_block, to_block));
        if state.failing_logs_from.is_some_and(|failing| from_block >= failing) {
            return Err(SyncError::TransientRead("log query timed out".to_string()));
        }
        let mut logs: Vec<RawLog> = state
            .logs
            .iter()
            .filter(|log| (from_block..=to_block).contains(&log.block_number))
            .filter(|log| filter.topics.first().is_none_or(|topic| log.topics.first() == Some(topic)))
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }
}
