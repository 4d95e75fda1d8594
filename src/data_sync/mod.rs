/// Data Synchronization Layer
///
/// Everything that talks to the ledger node:
///
/// - `LedgerClient` abstraction and its JSON-RPC implementation
/// - Bounded retries for transient read failures
/// - Timestamp to block height estimation
/// - Two-pool price composition at a given block
/// - Windowed, checkpointed event log scanning

pub mod block_time;
pub mod client;
pub mod config;
pub mod log_scanner;
pub mod price_feed;
pub mod reader;
pub mod rpc;

#[cfg(test)]
mod mock_client;


pub use block_time::{BlockTimeEstimator, EstimatorConfig, RefinedBlock};
pub use client::{BlockMeta, BlockTag, LedgerClient, LogFilter, RawLog, StorageLocator};
pub use config::{AppConfig, PriceSyncConfig, RouteConfig, RpcConfig, ScannerConfig, SupervisorConfig};
pub use log_scanner::{LogScanner, ScanReport, ScannerSettings};
pub use price_feed::{PoolRoute, PriceFeed, PriceQuote};
pub use reader::{RetryPolicy, RetryingReader};
pub use rpc::HttpLedgerClient;
