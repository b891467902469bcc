//! Tron USDT (TRC-20) transfer explorer client.

use super::{ChainExplorerClient, MonitorError, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TrongridResponse {
    data: Vec<TrongridEntry>,
}

#[derive(Debug, Deserialize)]
struct TrongridEntry {
    transaction_id: String,
    block_timestamp: i64,
    to: String,
    value: String,
    block: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    block_header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    raw_data: BlockRawData,
}

#[derive(Debug, Deserialize)]
struct BlockRawData {
    number: u64,
}

/// Queries a Trongrid-compatible API for USDT (TRC-20) transfers.
pub struct TronExplorer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    usdt_contract_address: String,
}

impl TronExplorer {
    pub fn new(base_url: String, api_key: Option<String>, usdt_contract_address: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");
        TronExplorer {
            client,
            base_url,
            api_key,
            usdt_contract_address,
        }
    }
}

#[async_trait]
impl ChainExplorerClient for TronExplorer {
    #[tracing::instrument(skip(self), fields(to_address))]
    async fn recent_transfers(&self, to_address: &str) -> Result<Vec<Transaction>, MonitorError> {
        let Some(api_key) = &self.api_key else {
            tracing::warn!("no tron explorer api key configured; reporting no transfers");
            return Ok(vec![]);
        };

        let url = format!(
            "{}/v1/accounts/{}/transactions/trc20",
            self.base_url, to_address
        );
        let response = self
            .client
            .get(&url)
            .query(&[
                ("contract_address", self.usdt_contract_address.as_str()),
                ("only_to", "true"),
                ("order_by", "block_timestamp,desc"),
            ])
            .header("TRON-PRO-API-KEY", api_key)
            .send()
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MonitorError::RateLimited(
                "trongrid rate limit exceeded".into(),
            ));
        }

        let parsed = response
            .json::<TrongridResponse>()
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?;

        let transfers = parsed
            .data
            .into_iter()
            .filter_map(|entry| {
                let amount_raw: i64 = entry.value.parse().ok()?;
                let timestamp = DateTime::from_timestamp_millis(entry.block_timestamp)?;
                Some(Transaction {
                    hash: entry.transaction_id,
                    block_number: entry.block.unwrap_or(0),
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
        let url = format!("{}/wallet/getnowblock", self.base_url);
        let response: BlockResponse = self
            .client
            .get(&url)
            .header("TRON-PRO-API-KEY", api_key)
            .send()
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| MonitorError::Transport(e.to_string()))?;
        Ok(response.block_header.raw_data.number)
    }

    fn case_insensitive_addresses(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_reports_no_transfers_not_error() {
        let explorer = TronExplorer::new(
            "https://api.trongrid.io".into(),
            None,
            "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
        );
        let transfers = explorer
            .recent_transfers("TLsV52sRDL79HXGGm9yzwKibb6BeruhUzy")
            .await
            .unwrap();
        assert!(transfers.is_empty());
    }
}
