use crate::error::Result;
use crate::logic::anchors::AnchorSchedule;
use crate::store::json_file::{read_json, write_json_atomic};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub block: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SampleKind {
    Target,
    Current,
}

/// On-disk layout: three co-indexed sequences plus the write time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    #[serde(default)]
    pub timestamps: Vec<i64>,
    #[serde(default)]
    pub blocks: Vec<u64>,
    #[serde(default)]
    pub prices: Vec<f64>,
    #[serde(default)]
    pub last_updated: f64,
}

/// Where the snapshot is persisted. The mirror is a second copy, typically
/// under a web root, and is only read when the primary file is absent or unreadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFiles {
    pub primary: PathBuf,
    pub mirror: Option<PathBuf>,
}

/// Time series of price samples ordered by timestamp.
///
/// Samples near an anchor time are targets and are kept until evicted by the
/// size cap; at most one other ("current") sample is kept alongside them.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    samples: Vec<Sample>,
    anchors: AnchorSchedule,
    last_updated: f64,
}

impl SnapshotStore {
    pub fn new(anchors: AnchorSchedule) -> Self {
        Self { samples: Vec::new(), anchors, last_updated: 0.0 }
    }

    pub fn from_samples(anchors: AnchorSchedule, mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self { samples, anchors, last_updated: 0.0 }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn anchors(&self) -> &AnchorSchedule {
        &self.anchors
    }

    pub fn last_updated(&self) -> f64 {
        self.last_updated
    }

    pub fn kind_of(&self, sample: &Sample) -> SampleKind {
        if self.anchors.is_target(sample.timestamp) { SampleKind::Target } else { SampleKind::Current }
    }

    pub fn target_count(&self) -> usize {
        self.samples.iter().filter(|s| self.kind_of(s) == SampleKind::Target).count()
    }

    pub fn current_count(&self) -> usize {
        self.len() - self.target_count()
    }

    /// True when a target sample lies strictly within the tolerance of `anchor`.
    pub fn has_target_near(&self, anchor: i64) -> bool {
        let tolerance = self.anchors.tolerance_secs();
        self.samples
            .iter()
            .any(|s| (s.timestamp - anchor).abs() < tolerance && self.kind_of(s) == SampleKind::Target)
    }

    /// Upper bound by timestamp, so equal timestamps keep arrival order.
    fn insert_position(&self, timestamp: i64) -> usize {
        self.samples.partition_point(|s| s.timestamp <= timestamp)
    }

    /// Inserts a sample tagged as target in timestamp order. A sample whose
    /// timestamp is not near an anchor is refused, since accepting it would
    /// add a second current sample.
    pub fn insert_target(&mut self, sample: Sample) -> bool {
        if self.kind_of(&sample) != SampleKind::Target {
            warn!("Refusing sample at {} (block {}) as target: not near an anchor time", sample.timestamp, sample.block);
            return false;
        }
        let position = self.insert_position(sample.timestamp);
        self.samples.insert(position, sample);
        true
    }

    /// Replaces every non-target sample with `sample`.
    pub fn upsert_current(&mut self, sample: Sample) {
        let anchors = &self.anchors;
        self.samples.retain(|s| anchors.is_target(s.timestamp));
        let position = self.insert_position(sample.timestamp);
        self.samples.insert(position, sample);
    }

    /// Keeps every target sample and only the latest non-target one.
    pub fn clean(&mut self) {
        let latest_current = self.samples.iter().rposition(|s| !self.anchors.is_target(s.timestamp));
        let before = self.samples.len();

        let mut index = 0;
        let anchors = &self.anchors;
        self.samples.retain(|s| {
            let keep = anchors.is_target(s.timestamp) || Some(index) == latest_current;
            index += 1;
            keep
        });

        if before != self.samples.len() {
            info!("Cleaned snapshot store: {} -> {} samples", before, self.samples.len());
        }
    }

    /// Drops the oldest samples until at most `max_samples` remain.
    pub fn evict_overflow(&mut self, max_samples: usize) -> usize {
        let overflow = self.samples.len().saturating_sub(max_samples);
        if overflow > 0 {
            self.samples.drain(..overflow);
            debug!("Evicted {} oldest samples", overflow);
        }
        overflow
    }

    fn from_file(anchors: AnchorSchedule, file: SnapshotFile) -> Self {
        let SnapshotFile { timestamps, blocks, prices, last_updated } = file;
        if timestamps.len() != blocks.len() || timestamps.len() != prices.len() {
            warn!(
                "Snapshot sequences differ in length ({} timestamps, {} blocks, {} prices), truncating",
                timestamps.len(),
                blocks.len(),
                prices.len()
            );
        }
        let samples = timestamps
            .into_iter()
            .zip(blocks)
            .zip(prices)
            .map(|((timestamp, block), value)| Sample { timestamp, block, value })
            .collect();
        let mut store = Self::from_samples(anchors, samples);
        store.last_updated = last_updated;
        store
    }

    fn to_file(&self) -> SnapshotFile {
        SnapshotFile {
            timestamps: self.samples.iter().map(|s| s.timestamp).collect(),
            blocks: self.samples.iter().map(|s| s.block).collect(),
            prices: self.samples.iter().map(|s| s.value).collect(),
            last_updated: self.last_updated,
        }
    }

    /// Loads the primary file, falling back to the mirror when the primary is
    /// absent or unreadable. With neither usable the store starts empty.
    pub async fn load(files: &SnapshotFiles, anchors: AnchorSchedule) -> Self {
        let mut file = read_or_warn(&files.primary).await;
        if file.is_none() {
            if let Some(mirror) = &files.mirror {
                file = read_or_warn(mirror).await;
            }
        }

        match file {
            Some(file) => {
                let store = Self::from_file(anchors, file);
                info!("Loaded {} samples, last updated {:.0}", store.len(), store.last_updated);
                store
            }
            None => {
                info!("No snapshot file found, starting fresh");
                Self::new(anchors)
            }
        }
    }

    /// Writes the primary file and then the mirror. A mirror failure is only
    /// logged.
    pub async fn persist(&mut self, files: &SnapshotFiles) -> Result<()> {
        self.last_updated = Utc::now().timestamp_millis() as f64 / 1000.0;
        let file = self.to_file();

        write_json_atomic(&files.primary, &file).await?;
        debug!("Snapshot saved to {}", files.primary.display());

        if let Some(mirror) = &files.mirror {
            if let Err(e) = write_json_atomic(mirror, &file).await {
                warn!("Failed to write snapshot mirror {}: {}", mirror.display(), e);
            }
        }
        Ok(())
    }
}

async fn read_or_warn(path: &Path) -> Option<SnapshotFile> {
    match read_json::<SnapshotFile>(path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
            None
        }
    }
}
