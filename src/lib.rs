// Layered the same way the binaries use it
pub mod data_sync; // Data Layer: ledger reads, retries, block estimation, scanning
pub mod logic; // Logic Layer: fixed-point decoding, anchors, event folding
pub mod service; // Service Layer: schedulers and supervision
pub mod store; // Durable state: snapshot, checkpoint, event log

// Common utilities and types
pub mod error;
pub mod utils;

pub use data_sync::{
    AppConfig, BlockMeta, BlockTag, BlockTimeEstimator, HttpLedgerClient, LedgerClient, LogScanner, PriceFeed,
    RetryPolicy, RetryingReader,
};
pub use error::{Result, SyncError};
pub use logic::{AnchorSchedule, MinedEventLog, Slot0};
pub use service::{MinedBlocksService, PriceSyncService, Supervisor};
pub use store::{CheckpointStore, EventLogStore, Sample, SnapshotStore};
