use ledger_snapshot_sync::data_sync::{AppConfig, BlockTimeEstimator, HttpLedgerClient, PriceFeed, RetryingReader};
use ledger_snapshot_sync::service::{PriceSyncService, PriceSyncSettings, Supervisor};
use ledger_snapshot_sync::utils::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn build_service(config: &AppConfig) -> eyre::Result<PriceSyncService> {
    let client = HttpLedgerClient::new(&config.price.rpc_url, config.rpc.http_timeout())?;
    let reader = RetryingReader::new(Arc::new(client), config.rpc.retry_policy());
    let estimator = BlockTimeEstimator::new(reader.clone(), config.price.estimator_config());
    let feed = PriceFeed::new(reader.clone(), config.route.pool_route());

    Ok(PriceSyncService::new(reader, estimator, feed, config.price.anchors(), PriceSyncSettings::from(&config.price)))
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config_file = std::env::args().nth(1).or_else(|| std::env::var("CONFIG_FILE").ok());
    let config = AppConfig::load(config_file)?;
    info!("Price sync against {}, snapshot at {}", config.price.rpc_url, config.price.data_file.display());

    let supervisor = Supervisor::new("price sync", Duration::from_secs(config.supervisor.price_cooldown_secs));
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
