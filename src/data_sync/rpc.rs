use crate::data_sync::client::{BlockMeta, BlockTag, LedgerClient, LogFilter, RawLog, StorageLocator};
use crate::error::{Result, SyncError};
use alloy_primitives::{B256, Bytes, U256};
use async_trait::async_trait;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// [`LedgerClient`] speaking Ethereum JSON-RPC over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    http_client: reqwest::Client,
    rpc_url: Url,
}

impl HttpLedgerClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let rpc_url = Url::parse(rpc_url).map_err(|e| SyncError::Config(format!("invalid RPC url {rpc_url}: {e}")))?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { http_client, rpc_url })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let request_body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        debug!("RPC {} {}", method, params);
        let response = self.http_client
            .post(self.rpc_url.clone())
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let response_json: Value = response.json().await?;
        take_result(response_json)
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn get_storage_at(&self, locator: &StorageLocator, block: u64) -> Result<U256> {
        let params = serde_json::json!([
            format!("{:#x}", locator.address),
            format!("{:#x}", locator.slot),
            BlockTag::Number(block).to_rpc_param()
        ]);
        let result = self.request("eth_getStorageAt", params).await?;
        parse_quantity(&result)
    }

    async fn get_block(&self, tag: BlockTag) -> Result<BlockMeta> {
        let params = serde_json::json!([tag.to_rpc_param(), false]);
        let result = self.request("eth_getBlockByNumber", params).await?;
        if result.is_null() {
            return match tag {
                BlockTag::Number(number) => Err(SyncError::BlockNotFound(number)),
                BlockTag::Latest => Err(SyncError::TransientRead("latest block unavailable".to_string())),
            };
        }
        parse_block(&result)
    }

    async fn get_logs(&self, from_block: u64, to_block: u64, filter: &LogFilter) -> Result<Vec<RawLog>> {
        let topics: Vec<String> = filter.topics.iter().map(|t| format!("{t:#x}")).collect();
        let params = serde_json::json!([{
            "fromBlock": BlockTag::Number(from_block).to_rpc_param(),
            "toBlock": BlockTag::Number(to_block).to_rpc_param(),
            "address": format!("{:#x}", filter.address),
            "topics": topics,
        }]);
        let result = self.request("eth_getLogs", params).await?;

        let mut logs = result
            .as_array()
            .ok_or_else(|| SyncError::Malformed("eth_getLogs result is not an array".to_string()))?
            .iter()
            .map(parse_log)
            .collect::<Result<Vec<_>>>()?;
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }
}

/// Splits a JSON-RPC envelope into its result. RPC errors (rate limits,
/// overloaded nodes) are treated as transient.
fn take_result(mut response: Value) -> Result<Value> {
    if let Some(error) = response.get("error") {
        return Err(SyncError::TransientRead(format!("RPC error: {error}")));
    }
    response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| SyncError::Malformed("missing result in RPC response".to_string()))
}

fn as_str<'a>(value: &'a Value, field: &str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| SyncError::Malformed(format!("{field} is not a string: {value}")))
}

fn parse_quantity(value: &Value) -> Result<U256> {
    let raw = as_str(value, "quantity")?;
    let digits = raw.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|e| SyncError::Malformed(format!("invalid quantity {raw}: {e}")))
}

fn parse_u64(value: &Value, field: &str) -> Result<u64> {
    let raw = as_str(value, field)?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).map_err(|e| SyncError::Malformed(format!("invalid {field} {raw}: {e}")))
}

fn parse_b256(value: &Value, field: &str) -> Result<B256> {
    let raw = as_str(value, field)?;
    B256::from_str(raw).map_err(|e| SyncError::Malformed(format!("invalid {field} {raw}: {e}")))
}

fn parse_block(value: &Value) -> Result<BlockMeta> {
    let number = parse_u64(&value["number"], "number")?;
    let timestamp = parse_u64(&value["timestamp"], "timestamp")?;
    Ok(BlockMeta { number, timestamp: timestamp as i64 })
}

fn parse_log(value: &Value) -> Result<RawLog> {
    let topics = value["topics"]
        .as_array()
        .ok_or_else(|| SyncError::Malformed("log topics missing".to_string()))?
        .iter()
        .map(|topic| parse_b256(topic, "topic"))
        .collect::<Result<Vec<_>>>()?;
    let data = as_str(&value["data"], "data")?;
    let data = hex::decode(data.trim_start_matches("0x")).map_err(|e| SyncError::Malformed(format!("invalid log data: {e}")))?;

    Ok(RawLog {
        block_number: parse_u64(&value["blockNumber"], "blockNumber")?,
        log_index: parse_u64(&value["logIndex"], "logIndex").unwrap_or_default(),
        transaction_hash: parse_b256(&value["transactionHash"], "transactionHash")?,
        topics,
        data: Bytes::from(data),
    })
}
