use ledger_snapshot_sync::data_sync::{AppConfig, HttpLedgerClient, LogScanner, RetryingReader, ScannerSettings};
use ledger_snapshot_sync::service::{MinedBlocksService, Supervisor};
use ledger_snapshot_sync::utils::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn build_service(config: &AppConfig) -> eyre::Result<MinedBlocksService> {
    let client = HttpLedgerClient::new(&config.scanner.rpc_url, config.rpc.http_timeout())?;
    let reader = RetryingReader::new(Arc::new(client), config.rpc.retry_policy());
    let scanner = LogScanner::new(reader, ScannerSettings::from(&config.scanner));

    Ok(MinedBlocksService::new(scanner, config.scanner.interval()))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config_file = std::env::args().nth(1).or_else(|| std::env::var("CONFIG_FILE").ok());
    let config = AppConfig::load(config_file)?;
    info!("Mined block scanner against {}, output {}", config.scanner.rpc_url, config.scanner.event_log_file.display());

    let supervisor = Supervisor::new("mined block scanner", Duration::from_secs(config.supervisor.scanner_cooldown_secs));
    let supervised = supervisor.supervise(|| {
        let config = config.clone();
        async move { build_service(&config)?.run().await }
    });

    tokio::select! {
        result = supervised => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
