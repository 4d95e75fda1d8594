/// Durable state
///
/// Every file is written through [`json_file::write_atomic`] (temporary file
/// plus rename) so that readers never observe a half-written document.
pub mod json_file;
pub mod snapshot;
pub mod checkpoint;
pub mod event_log;

pub use snapshot::{Sample, SampleKind, SnapshotFile, SnapshotFiles, SnapshotStore};
pub use checkpoint::CheckpointStore;
pub use event_log::{EventLogFile, EventLogStore};
