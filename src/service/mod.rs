/// Service Layer
///
/// Long-running loops built on the data sync layer: the price snapshot
/// scheduler, the mined block scanner loop, and the supervisor that restarts
/// either of them after a failure.

pub mod mined_blocks;
pub mod price_sync;
pub mod supervisor;

pub use mined_blocks::MinedBlocksService;
pub use price_sync::{BackfillReport, PriceSyncService, PriceSyncSettings, TickReport};
pub use supervisor::Supervisor;
