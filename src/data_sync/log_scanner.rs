use crate::data_sync::client::LogFilter;
use crate::data_sync::config::ScannerConfig;
use crate::data_sync::reader::RetryingReader;
use crate::error::Result;
use crate::logic::mined_event::{MintLayout, MinedEventLog};
use crate::store::{CheckpointStore, EventLogFile, EventLogStore};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerSettings {
    /// First block whose events are wanted.
    pub start_block: u64,
    /// Blocks per `read_events` window, inclusive on both ends.
    pub batch_size: u64,
    pub filter: LogFilter,
    pub layout: MintLayout,
    pub checkpoint_file: PathBuf,
    pub event_log_file: PathBuf,
    pub js_export: bool,
}

impl From<&ScannerConfig> for ScannerSettings {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            start_block: config.start_block,
            batch_size: config.batch_size,
            filter: config.log_filter(),
            layout: config.layout.clone(),
            checkpoint_file: config.checkpoint_file.clone(),
            event_log_file: config.event_log_file.clone(),
            js_export: config.js_export,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub windows: u32,
    pub events: usize,
    pub checkpoint: u64,
    pub head: u64,
}

/// Folds mint logs into the event log window by window, persisting the log
/// and then the checkpoint after every window so a restart never re-folds a
/// block and never skips one. The checkpoint is only written once the log
/// write for the same window has succeeded.
pub struct LogScanner {
    reader: RetryingReader,
    settings: ScannerSettings,
    checkpoint_store: CheckpointStore,
    event_store: EventLogStore,
    log: MinedEventLog,
    checkpoint: Option<u64>,
}

impl LogScanner {
    pub fn new(reader: RetryingReader, settings: ScannerSettings) -> Self {
        let checkpoint_store = CheckpointStore::new(settings.checkpoint_file.clone());
        let event_store = EventLogStore::new(settings.event_log_file.clone(), settings.js_export);
        Self { reader, settings, checkpoint_store, event_store, log: MinedEventLog::default(), checkpoint: None }
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    pub fn log(&self) -> &MinedEventLog {
        &self.log
    }

    pub fn checkpoint(&self) -> Option<u64> {
        self.checkpoint
    }

    /// Restores checkpoint and event log from disk. Runs once; later calls
    /// keep the in-memory state, which is never behind the files.
    async fn restore(&mut self) -> u64 {
        if let Some(checkpoint) = self.checkpoint {
            return checkpoint;
        }

        let initial = self.settings.start_block.saturating_sub(1);
        let checkpoint = match self.checkpoint_store.load().await {
            Ok(Some(last_block)) => last_block,
            Ok(None) => initial,
            Err(e) => {
                warn!("Unreadable checkpoint {}, starting from block {}: {}", self.checkpoint_store.path().display(), self.settings.start_block, e);
                initial
            }
        };

        match self.event_store.load().await {
            Ok(Some(file)) => {
                self.log = file.into_log();
                info!("Restored {} mined blocks from {}", self.log.len(), self.event_store.path().display());
            }
            Ok(None) => {}
            Err(e) => warn!("Unreadable event log {}, starting empty: {}", self.event_store.path().display(), e),
        }

        info!("Resuming scan after block {}", checkpoint);
        self.checkpoint = Some(checkpoint);
        checkpoint
    }

    async fn persist(&self, checkpoint: u64, head_number: u64, head_timestamp: i64) {
        let file = EventLogFile {
            mined_blocks: self.log.events().cloned().collect(),
            total_blocks: self.log.len(),
            last_updated: head_timestamp,
            latest_block_number: head_number,
            contract_address: self.settings.filter.address,
            mint_topic: self.settings.filter.topics.first().copied().unwrap_or_default(),
            previous_challenge: self.log.previous_challenge(),
        };
        // the checkpoint on disk must never run ahead of the saved log
        if let Err(e) = self.event_store.save(&file).await {
            warn!("Failed to save event log, keeping checkpoint {} in memory only: {}", checkpoint, e);
            return;
        }
        if let Err(e) = self.checkpoint_store.save(checkpoint).await {
            warn!("Failed to save checkpoint {}: {}", checkpoint, e);
        }
    }

    /// One pass from the checkpoint up to the current head. A failed window
    /// aborts the pass; everything before it stays folded and checkpointed.
    pub async fn scan_once(&mut self) -> Result<ScanReport> {
        let mut checkpoint = self.restore().await;
        let head = self.reader.read_head().await?;
        let mut report = ScanReport { checkpoint, head: head.number, ..ScanReport::default() };

        if checkpoint >= head.number {
            debug!("No new blocks after {}", checkpoint);
            return Ok(report);
        }

        let batch_size = self.settings.batch_size.max(1);
        while checkpoint < head.number {
            let from_block = checkpoint + 1;
            let to_block = checkpoint.saturating_add(batch_size).min(head.number);

            let logs = self.reader.read_events(from_block, to_block, &self.settings.filter).await?;
            for log in &logs {
                self.log.fold(log, &self.settings.layout);
            }
            debug!("Blocks {}..={}: {} mint events", from_block, to_block, logs.len());

            checkpoint = to_block;
            self.checkpoint = Some(checkpoint);
            self.persist(checkpoint, head.number, head.timestamp).await;

            report.windows += 1;
            report.events += logs.len();
            report.checkpoint = checkpoint;
        }

        info!("Scanned up to block {}: {} new events, {} total", checkpoint, report.events, self.log.len());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sync::client::BlockMeta;
    use crate::data_sync::mock_client::MockLedgerClient;
    use crate::data_sync::reader::RetryPolicy;
    use crate::logic::mined_event::tests::mint_log;
    use alloy_primitives::{Address, B256};
    use std::sync::Arc;
    use std::time::Duration;

    fn settings(dir: &std::path::Path, start_block: u64, batch_size: u64) -> ScannerSettings {
        ScannerSettings {
            start_block,
            batch_size,
            filter: LogFilter { address: Address::repeat_byte(0x7a), topics: vec![B256::repeat_byte(0xcf)] },
            layout: MintLayout::default(),
            checkpoint_file: dir.join("last_processed_block.json"),
            event_log_file: dir.join("mined_blocks.json"),
            js_export: false,
        }
    }

    fn reader(client: Arc<MockLedgerClient>) -> RetryingReader {
        RetryingReader::new(client, RetryPolicy { max_attempts: 1, delay: Duration::ZERO })
    }

    #[tokio::test]
    async fn test_windows_are_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockLedgerClient::new());
        client.push_block(BlockMeta { number: 25, timestamp: 1_700_000_000 });

        let mut scanner = LogScanner::new(reader(client.clone()), settings(dir.path(), 1, 10));
        let report = scanner.scan_once().await.unwrap();

        assert_eq!(client.log_requests(), vec![(1, 10), (11, 20), (21, 25)]);
        assert_eq!(report.windows, 3);
        assert_eq!(report.checkpoint, 25);
        assert_eq!(CheckpointStore::new(dir.path().join("last_processed_block.json")).load().await.unwrap(), Some(25));
    }

    #[tokio::test]
    async fn test_nothing_to_do_at_head() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockLedgerClient::new());
        client.push_block(BlockMeta { number: 25, timestamp: 1_700_000_000 });
        CheckpointStore::new(dir.path().join("last_processed_block.json")).save(25).await.unwrap();

        let mut scanner = LogScanner::new(reader(client.clone()), settings(dir.path(), 1, 10));
        let report = scanner.scan_once().await.unwrap();
        assert_eq!(report.windows, 0);
        assert!(client.log_requests().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_restarts_from_start_block() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockLedgerClient::new());
        client.push_block(BlockMeta { number: 60, timestamp: 1_700_000_000 });
        std::fs::write(dir.path().join("last_processed_block.json"), b"{not json").unwrap();

        let mut scanner = LogScanner::new(reader(client.clone()), settings(dir.path(), 50, 100));
        scanner.scan_once().await.unwrap();
        assert_eq!(client.log_requests(), vec![(50, 60)]);
    }

    #[tokio::test]
    async fn test_unwritable_event_log_holds_back_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();
        let mut settings = settings(dir.path(), 1, 100);
        settings.event_log_file = blocker.join("mined_blocks.json");

        let client = Arc::new(MockLedgerClient::new());
        client.push_block(BlockMeta { number: 20, timestamp: 1_700_000_000 });
        client.push_log(mint_log(5, 0, 50, 1));

        let mut scanner = LogScanner::new(reader(client.clone()), settings.clone());
        let report = scanner.scan_once().await.unwrap();
        assert_eq!(report.checkpoint, 20);
        assert_eq!(scanner.checkpoint(), Some(20));
        let checkpoints = CheckpointStore::new(settings.checkpoint_file.clone());
        assert_eq!(checkpoints.load().await.unwrap(), None);

        // once the directory is usable a fresh process re-reads the window
        std::fs::remove_file(&blocker).unwrap();
        let mut scanner = LogScanner::new(reader(client), settings.clone());
        scanner.scan_once().await.unwrap();

        let blocks: Vec<u64> = scanner.log().events().map(|e| e.block_number).collect();
        assert_eq!(blocks, vec![5]);
        let stored = EventLogStore::new(settings.event_log_file.clone(), false).load().await.unwrap().unwrap();
        assert_eq!(stored.total_blocks, 1);
        assert_eq!(checkpoints.load().await.unwrap(), Some(20));
    }

    #[tokio::test]
    async fn test_events_fold_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockLedgerClient::new());
        client.push_block(BlockMeta { number: 30, timestamp: 1_700_000_000 });
        client.push_log(mint_log(5, 0, 50, 1));
        client.push_log(mint_log(15, 1, 50, 1));

        let mut scanner = LogScanner::new(reader(client), settings(dir.path(), 1, 10));
        let report = scanner.scan_once().await.unwrap();

        assert_eq!(report.events, 2);
        let blocks: Vec<u64> = scanner.log().events().map(|e| e.block_number).collect();
        assert_eq!(blocks, vec![15, 5]);
    }
}
