use crate::data_sync::log_scanner::LogScanner;
use std::time::Duration;
use tracing::{error, info};

/// Runs [`LogScanner::scan_once`] every `interval`. A failed pass is logged
/// and the next one resumes from the checkpoint it left behind.
pub struct MinedBlocksService {
    scanner: LogScanner,
    interval: Duration,
}

impl MinedBlocksService {
    pub fn new(scanner: LogScanner, interval: Duration) -> Self {
        Self { scanner, interval }
    }

    pub fn scanner(&self) -> &LogScanner {
        &self.scanner
    }

    pub async fn run(&mut self) -> eyre::Result<()> {
        info!(
            "Scanning {:#x} from block {} every {:?}",
            self.scanner.settings().filter.address,
            self.scanner.settings().start_block,
            self.interval
        );

        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            match self.scanner.scan_once().await {
                Ok(report) if report.windows > 0 => {
                    info!("Pass done at block {}/{}: {} new events", report.checkpoint, report.head, report.events)
                }
                Ok(_) => {}
                Err(e) => error!("Scan pass failed: {}", e),
            }
        }
    }
}
