use crate::error::Result;
use crate::store::json_file::{read_json, write_json_atomic};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CheckpointFile {
    last_block: u64,
}

/// Durable marker of the highest block whose events are fully folded.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Option<u64>> {
        Ok(read_json::<CheckpointFile>(&self.path).await?.map(|file| file.last_block))
    }

    pub async fn save(&self, last_block: u64) -> Result<()> {
        write_json_atomic(&self.path, &CheckpointFile { last_block }).await
    }
}
