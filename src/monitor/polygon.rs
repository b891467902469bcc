//! Polygon (EVM) USDT transfer explorer client.

use super::{ChainExplorerClient, MonitorError, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TokenTxResponse {
    status: String,
    message: String,
    result: TokenTxResult,
}

/// The explorer returns either a transfer array or, on error, a plain string
/// in the same field — tagged so a non-JSON-array body still deserializes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenTxResult {
    Transfers(Vec<TokenTxEntry>),
    Message(String),
}

#[derive(Debug, Deserialize)]
struct TokenTxEntry {
    hash: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    value: String,
    to: String,
    #[serde(rename = "timeStamp")]
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct BlockNumberResponse {
    result: String,
}

/// Queries a Polygonscan-compatible JSON API for USDT (ERC-20) transfers.
pub struct PolygonExplorer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    usdt_contract_address: String,
}

impl PolygonExplorer {
    pub fn new(base_url: String, api_key: Option<String>, usdt_contract_address: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");
        PolygonExplorer {
            client,
            base_url,
            api_key,
            usdt_contract_address,
        }
    }

    fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let secs: i64 = raw.parse().ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

#[async_trait]
impl ChainExplorerClient for PolygonExplorer {
    #[tracing::instrument(skip(self), fields(to_address))]
    async fn recent_transfers(&self, to_address: &str) -> Result<Vec<Transaction>, MonitorError> {
        let Some(api_key) = &self.api_key else {
            tracing::warn!("no polygon explorer api key configured; reporting no transfers");
            return Ok(vec![]);
        };

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "account"),
                ("action", "tokentx"),
                ("contractaddress", self.usdt_contract_address.as_str()),
                ("address", to_address),
                ("sort", "desc"),
                ("apikey", api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?
            .json::<TokenTxResponse>()
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?;

        let entries = match response.result {
            TokenTxResult::Transfers(entries) => entries,
            TokenTxResult::Message(msg) => {
                if response.status == "0" && msg.to_lowercase().contains("rate limit") {
                    return Err(MonitorError::RateLimited(msg));
                }
                return Ok(vec![]);
            }
        };

        let transfers = entries
            .into_iter()
            .filter_map(|entry| {
                let amount_raw: i64 = entry.value.parse().ok()?;
                let block_number: u64 = entry.block_number.parse().ok()?;
                let timestamp = Self::parse_timestamp(&entry.timestamp)?;
                Some(Transaction {
                    hash: entry.hash,
                    block_number,
                    amount_raw,
                    to_address: entry.to,
                    timestamp,
                })
            })
            .collect();
        Ok(transfers)
    }

    async fn current_block_height(&self) -> Result<u64, MonitorError> {
        let Some(api_key) = &self.api_key else {
            return Ok(0);
        };
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "proxy"),
                ("action", "eth_blockNumber"),
                ("apikey", api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?
            .json::<BlockNumberResponse>()
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?;
        let without_prefix = response.result.trim_start_matches("0x");
        u64::from_str_radix(without_prefix, 16)
            .map_err(|e| MonitorError::Transport(format!("malformed block number: {e}")))
    }

    fn case_insensitive_addresses(&self) -> bool {
        true
    }
}
