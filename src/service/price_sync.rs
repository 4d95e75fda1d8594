use crate::data_sync::block_time::BlockTimeEstimator;
use crate::data_sync::client::BlockMeta;
use crate::data_sync::config::PriceSyncConfig;
use crate::data_sync::price_feed::PriceFeed;
use crate::data_sync::reader::RetryingReader;
use crate::error::Result;
use crate::logic::anchors::{AnchorSchedule, format_utc};
use crate::store::{Sample, SampleKind, SnapshotFiles, SnapshotStore};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSyncSettings {
    pub max_samples: usize,
    pub backfill_days: u32,
    pub persist_every: usize,
    pub tick_interval: Duration,
    pub request_pause: Duration,
    pub files: SnapshotFiles,
}

impl From<&PriceSyncConfig> for PriceSyncSettings {
    fn from(config: &PriceSyncConfig) -> Self {
        Self {
            max_samples: config.max_samples,
            backfill_days: config.backfill_days,
            persist_every: config.persist_every.max(1),
            tick_interval: config.tick_interval(),
            request_pause: config.request_pause(),
            files: config.snapshot_files(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub missing: usize,
    pub inserted: usize,
    /// Located blocks that ended up too far from their anchor to count as targets.
    pub refused: usize,
    pub failed: usize,
    pub evicted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub block: u64,
    pub timestamp: i64,
    pub price: f64,
    pub kind: SampleKind,
    pub stored_as_target: bool,
    pub next_anchor: Option<i64>,
    pub target_count: usize,
    pub current_count: usize,
}

impl TickReport {
    pub fn seconds_to_next_anchor(&self) -> Option<i64> {
        self.next_anchor.map(|anchor| anchor - self.timestamp)
    }
}

/// Keeps the snapshot store filled: a backfill over the missing anchors of
/// the history window, then a periodic tick at the head.
pub struct PriceSyncService {
    reader: RetryingReader,
    estimator: BlockTimeEstimator,
    feed: PriceFeed,
    store: SnapshotStore,
    settings: PriceSyncSettings,
}

impl PriceSyncService {
    pub fn new(
        reader: RetryingReader,
        estimator: BlockTimeEstimator,
        feed: PriceFeed,
        anchors: AnchorSchedule,
        settings: PriceSyncSettings,
    ) -> Self {
        Self { reader, estimator, feed, store: SnapshotStore::new(anchors), settings }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn settings(&self) -> &PriceSyncSettings {
        &self.settings
    }

    /// Replaces the in-memory store with the persisted one and drops stale
    /// current samples.
    pub async fn load(&mut self) {
        let anchors = self.store.anchors().clone();
        self.store = SnapshotStore::load(&self.settings.files, anchors).await;
        self.store.clean();
    }

    async fn persist_or_warn(&mut self) {
        if let Err(e) = self.store.persist(&self.settings.files).await {
            warn!("Failed to persist snapshot: {}", e);
        }
    }

    pub async fn backfill(&mut self) -> Result<BackfillReport> {
        let head = self.reader.read_head().await?;
        let seconds_per_block = self.estimator.calibrate(head).await;
        let missing = self.store.anchors().missing_anchors(&self.store.timestamps(), head.timestamp, self.settings.backfill_days);
        let mut report = BackfillReport { missing: missing.len(), ..BackfillReport::default() };

        info!("Backfilling {} missing anchors ({:.3} seconds per block)", missing.len(), seconds_per_block);

        for (index, anchor) in missing.into_iter().enumerate() {
            if index > 0 && !self.settings.request_pause.is_zero() {
                tokio::time::sleep(self.settings.request_pause).await;
            }

            let sample = match self.sample_anchor(anchor, head, seconds_per_block).await {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("Skipping anchor {}: {}", format_utc(anchor), e);
                    report.failed += 1;
                    continue;
                }
            };

            if !self.store.insert_target(sample) {
                report.refused += 1;
                continue;
            }
            report.inserted += 1;
            debug!("Anchor {} -> block {} price {:.8}", format_utc(anchor), sample.block, sample.value);

            if report.inserted % self.settings.persist_every == 0 {
                self.persist_or_warn().await;
            }
        }

        report.evicted = self.store.evict_overflow(self.settings.max_samples);
        self.persist_or_warn().await;

        info!(
            "Backfill done: {} inserted, {} refused, {} failed, {} evicted",
            report.inserted, report.refused, report.failed, report.evicted
        );
        Ok(report)
    }

    async fn sample_anchor(&self, anchor: i64, head: BlockMeta, seconds_per_block: f64) -> Result<Sample> {
        let located = self.estimator.locate(anchor, head, seconds_per_block).await?;
        let quote = self.feed.price_at(located.block.number).await?;
        Ok(Sample { timestamp: located.block.timestamp, block: located.block.number, value: quote.price })
    }

    /// Samples the head. Near an anchor that has no target yet the sample is
    /// kept as a target, otherwise it replaces the current sample.
    pub async fn tick(&mut self) -> Result<TickReport> {
        let head = self.reader.read_head().await?;
        let quote = self.feed.price_at(head.number).await?;
        let sample = Sample { timestamp: head.timestamp, block: head.number, value: quote.price };

        let anchors = self.store.anchors().clone();
        let mut stored_as_target = false;
        if anchors.is_target(head.timestamp) {
            let covered = anchors.nearest_anchor(head.timestamp).is_some_and(|anchor| self.store.has_target_near(anchor));
            if !covered {
                stored_as_target = self.store.insert_target(sample);
            }
        } else {
            self.store.upsert_current(sample);
        }

        self.store.evict_overflow(self.settings.max_samples);
        self.persist_or_warn().await;

        let report = TickReport {
            block: head.number,
            timestamp: head.timestamp,
            price: quote.price,
            kind: self.store.kind_of(&sample),
            stored_as_target,
            next_anchor: anchors.next_anchor(head.timestamp),
            target_count: self.store.target_count(),
            current_count: self.store.current_count(),
        };

        info!(
            "Block {} ({}): {} price {:.8}{}",
            report.block,
            format_utc(report.timestamp),
            report.kind,
            report.price,
            if report.kind == SampleKind::Target && !stored_as_target { ", anchor already covered" } else { "" }
        );
        if let Some(seconds) = report.seconds_to_next_anchor() {
            info!(
                "Next anchor in {:.1} hours, store has {} targets and {} current",
                seconds as f64 / 3600.0,
                report.target_count,
                report.current_count
            );
        }
        Ok(report)
    }

    /// Load, backfill, then tick forever. Failed ticks are logged and retried
    /// on the next interval; only load and backfill errors end the run.
    pub async fn run(&mut self) -> eyre::Result<()> {
        self.load().await;
        self.backfill().await?;

        let mut interval = tokio::time::interval(self.settings.tick_interval);
        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                error!("Price tick failed: {}", e);
            }
        }
    }
}
