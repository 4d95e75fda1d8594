use crate::data_sync::client::{BlockMeta, BlockTag, LedgerClient, LogFilter, RawLog, StorageLocator};
use crate::error::{Result, SyncError};
use alloy_primitives::U256;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Fixed-delay retry policy. No backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, delay: Duration::from_secs(2) }
    }
}

/// Wraps a [`LedgerClient`] so that every logical read is retried on
/// transient failure. Once the attempts are used up the read fails with
/// [`SyncError::ReadExhausted`]; permanent failures are returned at once.
#[derive(Clone)]
pub struct RetryingReader {
    client: Arc<dyn LedgerClient>,
    policy: RetryPolicy,
}

impl RetryingReader {
    pub fn new(client: Arc<dyn LedgerClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn read_storage(&self, locator: &StorageLocator, block: u64) -> Result<U256> {
        self.with_retry(|| format!("storage {locator}@{block}"), || self.client.get_storage_at(locator, block)).await
    }

    pub async fn read_block_meta(&self, tag: BlockTag) -> Result<BlockMeta> {
        self.with_retry(|| format!("block {tag}"), || self.client.get_block(tag)).await
    }

    pub async fn read_head(&self) -> Result<BlockMeta> {
        self.read_block_meta(BlockTag::Latest).await
    }

    pub async fn read_events(&self, from_block: u64, to_block: u64, filter: &LogFilter) -> Result<Vec<RawLog>> {
        self.with_retry(|| format!("logs {from_block}..={to_block}"), || self.client.get_logs(from_block, to_block, filter)).await
    }

    async fn with_retry<T, L, F, Fut>(&self, locator: L, mut op: F) -> Result<T>
    where
        L: Fn() -> String,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Read {} succeeded on attempt {}", locator(), attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    warn!("Retry {}/{} for {} failed: {}", attempt, max_attempts, locator(), e);
                    if attempt >= max_attempts {
                        return Err(SyncError::ReadExhausted { locator: locator(), attempts: attempt, last_error: e.to_string() });
                    }
                    sleep(self.policy.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
