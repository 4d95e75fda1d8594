use crate::error::Result;
use crate::logic::mined_event::{MinedEvent, MinedEventLog};
use crate::store::json_file::{read_json, write_atomic, write_json_atomic};
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogFile {
    pub mined_blocks: Vec<MinedEvent>,
    pub total_blocks: usize,
    pub last_updated: i64,
    pub latest_block_number: u64,
    pub contract_address: Address,
    pub mint_topic: B256,
    pub previous_challenge: Option<B256>,
}

impl EventLogFile {
    pub fn into_log(self) -> MinedEventLog {
        MinedEventLog::restore(self.mined_blocks, self.previous_challenge)
    }
}

/// Persists the mined event list, optionally next to a CommonJS module with
/// the same content for static web pages.
#[derive(Debug, Clone)]
pub struct EventLogStore {
    path: PathBuf,
    js_export: bool,
}

impl EventLogStore {
    pub fn new(path: impl Into<PathBuf>, js_export: bool) -> Self {
        Self { path: path.into(), js_export }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn js_path(&self) -> PathBuf {
        self.path.with_extension("js")
    }

    pub async fn load(&self) -> Result<Option<EventLogFile>> {
        read_json(&self.path).await
    }

    /// Nothing is written while the list is empty.
    pub async fn save(&self, file: &EventLogFile) -> Result<()> {
        if file.mined_blocks.is_empty() {
            return Ok(());
        }

        write_json_atomic(&self.path, file).await?;
        debug!("Saved {} mined blocks to {}", file.total_blocks, self.path.display());

        if self.js_export {
            let json = serde_json::to_string_pretty(file)?;
            let module = format!("const minedBlocksData = {json};\nmodule.exports = minedBlocksData;\n");
            write_atomic(&self.js_path(), module.as_bytes()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(events: Vec<MinedEvent>) -> EventLogFile {
        EventLogFile {
            total_blocks: events.len(),
            mined_blocks: events,
            last_updated: 1_700_000_000,
            latest_block_number: 500,
            contract_address: Address::repeat_byte(0x7a),
            mint_topic: B256::repeat_byte(0xcf),
            previous_challenge: Some(B256::repeat_byte(0x01)),
        }
    }

    fn event(block_number: u64, amount: f64) -> MinedEvent {
        MinedEvent { block_number, transaction_hash: B256::repeat_byte(0xaa), miner: Address::repeat_byte(0x42), amount }
    }

    #[tokio::test]
    async fn test_round_trip_restores_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventLogStore::new(dir.path().join("mined_blocks.json"), false);
        store.save(&file(vec![event(12, 50.0), event(12, -1.0), event(10, 50.0)])).await.unwrap();

        let log = store.load().await.unwrap().unwrap().into_log();
        assert_eq!(log.len(), 3);
        assert_eq!(log.previous_challenge(), Some(B256::repeat_byte(0x01)));
        assert!(log.events().nth(1).is_some_and(MinedEvent::is_challenge_marker));
        assert!(!store.js_path().exists());
    }

    #[tokio::test]
    async fn test_empty_list_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventLogStore::new(dir.path().join("mined_blocks.json"), true);
        store.save(&file(vec![])).await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert!(!store.js_path().exists());
    }

    #[tokio::test]
    async fn test_js_module_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventLogStore::new(dir.path().join("mined_blocks.json"), true);
        store.save(&file(vec![event(10, 50.0)])).await.unwrap();

        let module = std::fs::read_to_string(store.js_path()).unwrap();
        assert!(module.starts_with("const minedBlocksData = {"));
        assert!(module.ends_with("module.exports = minedBlocksData;\n"));
        assert!(module.contains("\"total_blocks\": 1"));
    }
}
