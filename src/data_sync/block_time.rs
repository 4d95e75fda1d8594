use crate::data_sync::client::{BlockMeta, BlockTag};
use crate::data_sync::reader::RetryingReader;
use crate::error::Result;
use crate::utils::constants::{DEFAULT_SECONDS_PER_BLOCK, SECONDS_PER_DAY};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    /// Initial guess, also used whenever calibration is impossible.
    pub default_seconds_per_block: f64,
    /// How far back the calibration reference block is sampled.
    pub calibration_window_secs: i64,
    pub tolerance_secs: i64,
    pub max_refinements: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            default_seconds_per_block: DEFAULT_SECONDS_PER_BLOCK,
            calibration_window_secs: SECONDS_PER_DAY,
            tolerance_secs: 30 * 60,
            max_refinements: 10,
        }
    }
}

/// Observed block rate between two blocks, or `fallback` when the pair
/// cannot give a positive rate.
pub fn seconds_per_block(current: BlockMeta, reference: BlockMeta, fallback: f64) -> f64 {
    let block_diff = current.number as i64 - reference.number as i64;
    let time_diff = current.timestamp - reference.timestamp;
    if block_diff > 0 && time_diff > 0 { time_diff as f64 / block_diff as f64 } else { fallback }
}

/// Linear extrapolation back from the head. Never below block 1.
pub fn extrapolate_block(target_timestamp: i64, head: BlockMeta, seconds_per_block: f64) -> u64 {
    let blocks_diff = ((head.timestamp - target_timestamp) as f64 / seconds_per_block) as i64;
    (head.number as i64 - blocks_diff).max(1) as u64
}

/// Outcome of the refinement loop. A result outside the tolerance is still
/// usable; callers log the residual and carry on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinedBlock {
    pub block: BlockMeta,
    pub target_timestamp: i64,
    pub corrections: u32,
    pub degraded: bool,
}

impl RefinedBlock {
    pub fn residual_secs(&self) -> i64 {
        (self.block.timestamp - self.target_timestamp).abs()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Maps wall-clock timestamps to block heights.
#[derive(Clone)]
pub struct BlockTimeEstimator {
    reader: RetryingReader,
    config: EstimatorConfig,
}

impl BlockTimeEstimator {
    pub fn new(reader: RetryingReader, config: EstimatorConfig) -> Self {
        Self { reader, config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Measures seconds per block against a reference block roughly one
    /// calibration window behind `head`.
    pub async fn calibrate(&self, head: BlockMeta) -> f64 {
        let fallback = self.config.default_seconds_per_block;
        let offset = (self.config.calibration_window_secs as f64 / fallback) as u64;
        let reference_number = head.number.saturating_sub(offset).max(1);
        if reference_number >= head.number {
            return fallback;
        }

        match self.reader.read_block_meta(BlockTag::Number(reference_number)).await {
            Ok(reference) => {
                let rate = seconds_per_block(head, reference, fallback);
                debug!(
                    "Calculated seconds per block: {:.3} (over {} blocks, {:.1} hours)",
                    rate,
                    head.number.saturating_sub(reference.number),
                    (head.timestamp - reference.timestamp) as f64 / 3600.0
                );
                rate
            }
            Err(e) => {
                warn!("Calibration against block {} failed, using {} seconds per block: {}", reference_number, fallback, e);
                fallback
            }
        }
    }

    pub async fn estimate_block(&self, target_timestamp: i64, head: BlockMeta) -> u64 {
        let rate = self.calibrate(head).await;
        extrapolate_block(target_timestamp, head, rate)
    }

    /// Walks an estimate towards `target_timestamp`, moving by half the
    /// timestamp error (in default-rate blocks) per step, clamped to
    /// `[1, head]`. Stops inside the tolerance or after `max_refinements`.
    pub async fn refine(&self, target_timestamp: i64, estimate: u64, head: BlockMeta) -> Result<RefinedBlock> {
        let tolerance = self.config.tolerance_secs;
        let upper = head.number.max(1) as i64;
        let mut block = self.reader.read_block_meta(BlockTag::Number(estimate.clamp(1, upper as u64))).await?;
        let mut corrections = 0;

        while (block.timestamp - target_timestamp).abs() > tolerance && corrections < self.config.max_refinements {
            let step = ((target_timestamp - block.timestamp) as f64 / self.config.default_seconds_per_block) as i64;
            let candidate = (block.number as i64 + step).clamp(1, upper) as u64;
            if candidate == block.number {
                break;
            }
            block = self.reader.read_block_meta(BlockTag::Number(candidate)).await?;
            corrections += 1;
        }

        let refined = RefinedBlock {
            block,
            target_timestamp,
            corrections,
            degraded: (block.timestamp - target_timestamp).abs() > tolerance,
        };
        if refined.is_degraded() {
            warn!(
                "Block {} is {}s away from target {} after {} corrections",
                refined.block.number,
                refined.residual_secs(),
                target_timestamp,
                corrections
            );
        }
        Ok(refined)
    }

    /// Estimate with a previously calibrated rate, then refine.
    pub async fn locate(&self, target_timestamp: i64, head: BlockMeta, seconds_per_block: f64) -> Result<RefinedBlock> {
        let estimate = extrapolate_block(target_timestamp, head, seconds_per_block);
        self.refine(target_timestamp, estimate, head).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sync::mock_client::MockLedgerClient;
    use crate::data_sync::reader::RetryPolicy;
    use std::sync::Arc;
    use std::time::Duration;

    const T: i64 = 1_700_000_000;

    fn estimator(client: Arc<MockLedgerClient>, config: EstimatorConfig) -> BlockTimeEstimator {
        let reader = RetryingReader::new(client, RetryPolicy { max_attempts: 2, delay: Duration::ZERO });
        BlockTimeEstimator::new(reader, config)
    }

    #[test]
    fn test_seconds_per_block_fallback() {
        let head = BlockMeta { number: 1000, timestamp: T };
        assert_eq!(seconds_per_block(head, BlockMeta { number: 900, timestamp: T - 200 }, 2.0), 2.0);
        assert_eq!(seconds_per_block(head, BlockMeta { number: 800, timestamp: T - 100 }, 2.0), 0.5);
        assert_eq!(seconds_per_block(head, BlockMeta { number: 1000, timestamp: T - 100 }, 2.0), 2.0);
        assert_eq!(seconds_per_block(head, BlockMeta { number: 900, timestamp: T }, 3.0), 3.0);
    }

    #[test]
    fn test_extrapolate_clamps_to_first_block() {
        let head = BlockMeta { number: 1000, timestamp: T };
        assert_eq!(extrapolate_block(T - 100, head, 2.0), 950);
        assert_eq!(extrapolate_block(T - 1_000_000, head, 2.0), 1);
    }

    #[tokio::test]
    async fn test_estimate_uses_measured_rate() {
        let client = Arc::new(MockLedgerClient::new());
        client.push_block(BlockMeta { number: 900, timestamp: T - 200 });
        client.push_block(BlockMeta { number: 1000, timestamp: T });
        let config = EstimatorConfig { calibration_window_secs: 200, ..EstimatorConfig::default() };

        let head = BlockMeta { number: 1000, timestamp: T };
        let estimator = estimator(client, config);
        assert_eq!(estimator.calibrate(head).await, 2.0);
        assert_eq!(estimator.estimate_block(T - 100, head).await, 950);
    }

    #[tokio::test]
    async fn test_calibration_falls_back_when_reference_missing() {
        let client = Arc::new(MockLedgerClient::new());
        client.push_block(BlockMeta { number: 1000, timestamp: T });
        let config = EstimatorConfig { calibration_window_secs: 200, ..EstimatorConfig::default() };

        let estimator = estimator(client, config);
        assert_eq!(estimator.calibrate(BlockMeta { number: 1000, timestamp: T }).await, 2.0);
    }

    #[tokio::test]
    async fn test_refine_converges_within_tolerance() {
        let client = Arc::new(MockLedgerClient::new());
        // real chain produces one block per second
        client.set_linear_chain(100_000, T, 1.0);
        let head = BlockMeta { number: 100_000, timestamp: T };

        let refined = estimator(client, EstimatorConfig::default()).refine(T - 36_000, 50_000, head).await.unwrap();
        assert!(!refined.is_degraded());
        assert!(refined.residual_secs() <= 1800);
        assert_eq!(refined.corrections, 3);
        assert_eq!(refined.block.number, 62_250);
    }

    #[tokio::test]
    async fn test_refine_is_best_effort_after_cap() {
        let client = Arc::new(MockLedgerClient::new());
        client.set_linear_chain(100_000, T, 1.0);
        let head = BlockMeta { number: 100_000, timestamp: T };
        let config = EstimatorConfig { max_refinements: 1, ..EstimatorConfig::default() };

        let refined = estimator(client, config).refine(T - 36_000, 50_000, head).await.unwrap();
        assert!(refined.is_degraded());
        assert_eq!(refined.corrections, 1);
        assert_eq!(refined.block.number, 57_000);
        assert_eq!(refined.residual_secs(), 7_000);
    }

    #[tokio::test]
    async fn test_refine_never_passes_head() {
        let client = Arc::new(MockLedgerClient::new());
        client.set_linear_chain(1_000, T, 2.0);
        let head = BlockMeta { number: 1_000, timestamp: T };

        let refined = estimator(client, EstimatorConfig::default()).refine(T + 10_000, 990, head).await.unwrap();
        assert_eq!(refined.block.number, 1_000);
        assert!(refined.is_degraded());
    }
}
