use crate::data_sync::block_time::EstimatorConfig;
use crate::data_sync::client::{LogFilter, StorageLocator};
use crate::data_sync::price_feed::PoolRoute;
use crate::data_sync::reader::RetryPolicy;
use crate::logic::anchors::AnchorSchedule;
use crate::logic::mined_event::MintLayout;
use crate::store::SnapshotFiles;
use crate::utils::config_loader::{LoadConfigError, SectionLoaderSync, load_from_file_sync};
use crate::utils::constants::*;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Retry behaviour shared by every ledger read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { max_attempts: 5, retry_delay_secs: 2, http_timeout_secs: 10 }
    }
}

impl RpcConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy { max_attempts: self.max_attempts, delay: Duration::from_secs(self.retry_delay_secs) }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Pools whose prices are composed. Deployment specific, so every key is
/// required in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub pool_manager: Address,
    pub base_slot: B256,
    pub quote_slot: B256,
    /// Cross-pool scale is `10^decimal_exponent`.
    pub decimal_exponent: i32,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            pool_manager: POOL_MANAGER,
            base_slot: BWORK_WETH_SLOT0,
            quote_slot: WETH_USD_SLOT0,
            decimal_exponent: WETH_USD_DECIMAL_EXPONENT,
        }
    }
}

impl RouteConfig {
    pub fn pool_route(&self) -> PoolRoute {
        PoolRoute {
            base_leg: StorageLocator { address: self.pool_manager, slot: self.base_slot },
            quote_leg: StorageLocator { address: self.pool_manager, slot: self.quote_slot },
            decimal_exponent: self.decimal_exponent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceSyncConfig {
    pub rpc_url: String,
    /// UTC hours at which target samples are taken.
    pub anchor_hours: Vec<u32>,
    pub tolerance_minutes: i64,
    pub max_samples: usize,
    pub backfill_days: u32,
    /// Backfill persists after this many insertions.
    pub persist_every: usize,
    pub tick_interval_secs: u64,
    /// Pause between backfill reads to go easy on the RPC.
    pub request_pause_ms: u64,
    pub default_seconds_per_block: f64,
    pub calibration_window_secs: i64,
    pub max_refinements: u32,
    pub data_file: PathBuf,
    pub mirror_file: Option<PathBuf>,
}

impl Default for PriceSyncConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_PRICE_RPC_URL.to_string(),
            anchor_hours: DEFAULT_ANCHOR_HOURS.to_vec(),
            tolerance_minutes: 30,
            max_samples: 4 * 30,
            backfill_days: 30,
            persist_every: 20,
            tick_interval_secs: 5 * 60,
            request_pause_ms: 500,
            default_seconds_per_block: DEFAULT_SECONDS_PER_BLOCK,
            calibration_window_secs: SECONDS_PER_DAY,
            max_refinements: 10,
            data_file: PathBuf::from("price_data_bwork.json"),
            mirror_file: None,
        }
    }
}

impl PriceSyncConfig {
    pub fn anchors(&self) -> AnchorSchedule {
        AnchorSchedule::new(self.anchor_hours.clone(), self.tolerance_minutes)
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            default_seconds_per_block: self.default_seconds_per_block,
            calibration_window_secs: self.calibration_window_secs,
            tolerance_secs: self.tolerance_minutes * 60,
            max_refinements: self.max_refinements,
        }
    }

    pub fn snapshot_files(&self) -> SnapshotFiles {
        SnapshotFiles { primary: self.data_file.clone(), mirror: self.mirror_file.clone() }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn request_pause(&self) -> Duration {
        Duration::from_millis(self.request_pause_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    pub mint_topic: B256,
    pub start_block: u64,
    pub batch_size: u64,
    pub interval_secs: u64,
    pub checkpoint_file: PathBuf,
    pub event_log_file: PathBuf,
    /// Also write `<event_log_file>.js` as a CommonJS module.
    pub js_export: bool,
    pub layout: MintLayout,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_SCANNER_RPC_URL.to_string(),
            contract_address: BWORK_CONTRACT,
            mint_topic: MINT_TOPIC,
            start_block: SCAN_START_BLOCK,
            batch_size: 499,
            interval_secs: 3 * 60,
            checkpoint_file: PathBuf::from("last_processed_block.json"),
            event_log_file: PathBuf::from("mined_blocks.json"),
            js_export: true,
            layout: MintLayout::default(),
        }
    }
}

impl ScannerConfig {
    pub fn log_filter(&self) -> LogFilter {
        LogFilter { address: self.contract_address, topics: vec![self.mint_topic] }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Cooldown before a failed subsystem is restarted from durable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    pub price_cooldown_secs: u64,
    pub scanner_cooldown_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { price_cooldown_secs: 200, scanner_cooldown_secs: 175 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    pub route: RouteConfig,
    #[serde(default)]
    pub price: PriceSyncConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

fn parse_var<T>(name: &str, raw: Option<String>) -> eyre::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    raw.map(|value| value.parse::<T>().map_err(|e| eyre::eyre!("Invalid {}: {}", name, e))).transpose()
}

fn parse_url(name: &str, raw: Option<String>) -> eyre::Result<Option<String>> {
    raw.map(|value| {
        Url::parse(&value).map_err(|e| eyre::eyre!("Invalid {}: {}", name, e))?;
        Ok(value)
    })
    .transpose()
}

impl AppConfig {
    /// Defaults of the observed deployment, overridden by environment variables.
    pub fn from_env() -> eyre::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> eyre::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if lookup("PRICE_DECIMAL_EXPONENT").is_none() {
            warn!(
                "PRICE_DECIMAL_EXPONENT not set, scaling prices by 10^{}",
                config.route.decimal_exponent
            );
        }
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file (with `${VAR}` expansion) when given, then applies
    /// the same environment overrides as [`AppConfig::from_env`].
    pub fn load(file_name: Option<String>) -> eyre::Result<Self> {
        let Some(file_name) = file_name else {
            return Self::from_env();
        };
        let mut config = Self::load_section_from_file_sync(file_name.clone())
            .map_err(|e| eyre::eyre!("Failed to load {}: {}", file_name, e))?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> eyre::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = parse_url("PRICE_RPC_URL", lookup("PRICE_RPC_URL"))? {
            self.price.rpc_url = url;
        }
        if let Some(url) = parse_url("SCANNER_RPC_URL", lookup("SCANNER_RPC_URL"))? {
            self.scanner.rpc_url = url;
        }
        if let Some(value) = parse_var("RPC_MAX_ATTEMPTS", lookup("RPC_MAX_ATTEMPTS"))? {
            self.rpc.max_attempts = value;
        }
        if let Some(value) = parse_var("RPC_RETRY_DELAY_SECS", lookup("RPC_RETRY_DELAY_SECS"))? {
            self.rpc.retry_delay_secs = value;
        }
        if let Some(value) = parse_var("RPC_HTTP_TIMEOUT_SECS", lookup("RPC_HTTP_TIMEOUT_SECS"))? {
            self.rpc.http_timeout_secs = value;
        }
        if let Some(value) = parse_var("PRICE_DECIMAL_EXPONENT", lookup("PRICE_DECIMAL_EXPONENT"))? {
            self.route.decimal_exponent = value;
        }
        if let Some(value) = parse_var("PRICE_DATA_FILE", lookup("PRICE_DATA_FILE"))? {
            self.price.data_file = value;
        }
        if let Some(value) = parse_var("PRICE_MIRROR_FILE", lookup("PRICE_MIRROR_FILE"))? {
            self.price.mirror_file = Some(value);
        }
        if let Some(value) = parse_var("PRICE_MAX_SAMPLES", lookup("PRICE_MAX_SAMPLES"))? {
            self.price.max_samples = value;
        }
        if let Some(value) = parse_var("PRICE_TICK_INTERVAL_SECS", lookup("PRICE_TICK_INTERVAL_SECS"))? {
            self.price.tick_interval_secs = value;
        }
        if let Some(value) = parse_var("PRICE_TOLERANCE_MINUTES", lookup("PRICE_TOLERANCE_MINUTES"))? {
            self.price.tolerance_minutes = value;
        }
        if let Some(value) = lookup("PRICE_ANCHOR_HOURS") {
            self.price.anchor_hours = value
                .split(',')
                .map(|h| h.trim().parse::<u32>().map_err(|e| eyre::eyre!("Invalid PRICE_ANCHOR_HOURS: {}", e)))
                .collect::<eyre::Result<Vec<_>>>()?;
        }
        if let Some(value) = parse_var("SCANNER_START_BLOCK", lookup("SCANNER_START_BLOCK"))? {
            self.scanner.start_block = value;
        }
        if let Some(value) = parse_var("SCANNER_BATCH_SIZE", lookup("SCANNER_BATCH_SIZE"))? {
            self.scanner.batch_size = value;
        }
        if let Some(value) = parse_var("SCANNER_INTERVAL_SECS", lookup("SCANNER_INTERVAL_SECS"))? {
            self.scanner.interval_secs = value;
        }
        if let Some(value) = parse_var("SCANNER_CHECKPOINT_FILE", lookup("SCANNER_CHECKPOINT_FILE"))? {
            self.scanner.checkpoint_file = value;
        }
        if let Some(value) = parse_var("SCANNER_EVENT_LOG_FILE", lookup("SCANNER_EVENT_LOG_FILE"))? {
            self.scanner.event_log_file = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> eyre::Result<()> {
        Url::parse(&self.price.rpc_url).map_err(|e| eyre::eyre!("Invalid price rpc_url: {}", e))?;
        Url::parse(&self.scanner.rpc_url).map_err(|e| eyre::eyre!("Invalid scanner rpc_url: {}", e))?;
        if self.rpc.max_attempts == 0 {
            return Err(eyre::eyre!("rpc.max_attempts must be at least 1"));
        }
        if self.scanner.batch_size == 0 {
            return Err(eyre::eyre!("scanner.batch_size must be at least 1"));
        }
        if self.price.persist_every == 0 {
            return Err(eyre::eyre!("price.persist_every must be at least 1"));
        }
        if self.price.anchor_hours.is_empty() || self.price.anchor_hours.iter().any(|h| *h >= 24) {
            return Err(eyre::eyre!("price.anchor_hours must be non-empty hours in 0..24"));
        }
        if self.price.default_seconds_per_block <= 0.0 {
            return Err(eyre::eyre!("price.default_seconds_per_block must be positive"));
        }
        Ok(())
    }
}

impl SectionLoaderSync for AppConfig {
    type SectionType = AppConfig;

    fn load_section_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        load_from_file_sync(file_name)
    }
}
