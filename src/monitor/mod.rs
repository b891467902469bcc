//! Blockchain transaction monitor port + composite adapter.
//!
//! One port trait, one concrete client per chain, and a composite that
//! routes by [`ChainType`] so callers never match on chain themselves.

pub mod polygon;
pub mod tron;

use crate::payment_method::ChainType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// A single on-chain USDT transfer as reported by an explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: String,
    pub block_number: u64,
    pub amount_raw: i64,
    pub to_address: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    #[error("explorer transport error: {0}")]
    Transport(String),
    #[error("explorer rate limit exceeded: {0}")]
    RateLimited(String),
}

/// Clock-skew buffer applied to the `created_after` transaction filter.
pub const CREATED_AFTER_SKEW_SECONDS: i64 = 30;

/// Finds a matching transfer and reports confirmation depth, per chain.
///
/// `find_transaction` returning `Ok(None)` means "not yet, keep polling" —
/// including the case of a missing API key, which is deliberately not an
/// error so the confirmation worker keeps making progress on other chains.
#[async_trait]
pub trait BlockchainMonitor: Send + Sync {
    async fn find_transaction(
        &self,
        chain: ChainType,
        to_address: &str,
        expected_amount_raw: i64,
        created_after: DateTime<Utc>,
    ) -> Result<Option<Transaction>, MonitorError>;

    /// Confirmation depth of a transfer already found at `tx_block_number`:
    /// `current_block_height - tx_block_number + 1`.
    async fn get_confirmations(
        &self,
        chain: ChainType,
        tx_block_number: u64,
    ) -> Result<u32, MonitorError>;
}

/// Single-chain explorer client, implemented once per chain family.
#[async_trait]
pub trait ChainExplorerClient: Send + Sync {
    /// Recent USDT transfers to `to_address`, ordered desc by time, already
    /// filtered to the chain's USDT contract address upstream.
    async fn recent_transfers(&self, to_address: &str) -> Result<Vec<Transaction>, MonitorError>;

    async fn current_block_height(&self) -> Result<u64, MonitorError>;

    /// Whether addresses on this chain are compared case-insensitively.
    fn case_insensitive_addresses(&self) -> bool;
}

fn addresses_match(a: &str, b: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// Routes by [`ChainType`] to the configured per-chain explorer client and
/// applies the shared selection rule: exact amount, matching address,
/// `tx_timestamp >= created_after - 30s`, first match wins.
pub struct CompositeMonitor {
    clients: HashMap<ChainType, Arc<dyn ChainExplorerClient>>,
}

impl CompositeMonitor {
    pub fn new(clients: HashMap<ChainType, Arc<dyn ChainExplorerClient>>) -> Self {
        CompositeMonitor { clients }
    }

    fn client_for(&self, chain: ChainType) -> Option<&Arc<dyn ChainExplorerClient>> {
        self.clients.get(&chain)
    }
}

#[async_trait]
impl BlockchainMonitor for CompositeMonitor {
    #[tracing::instrument(skip(self), fields(chain = %chain, to_address))]
    async fn find_transaction(
        &self,
        chain: ChainType,
        to_address: &str,
        expected_amount_raw: i64,
        created_after: DateTime<Utc>,
    ) -> Result<Option<Transaction>, MonitorError> {
        let Some(client) = self.client_for(chain) else {
            tracing::warn!(chain = %chain, "no explorer client configured; treating as not-found");
            return Ok(None);
        };
        let transfers = client.recent_transfers(to_address).await?;
        let cutoff = created_after - chrono::Duration::seconds(CREATED_AFTER_SKEW_SECONDS);
        let case_insensitive = client.case_insensitive_addresses();
        let found = transfers.into_iter().find(|tx| {
            tx.amount_raw == expected_amount_raw
                && addresses_match(&tx.to_address, to_address, case_insensitive)
                && tx.timestamp >= cutoff
        });
        Ok(found)
    }

    async fn get_confirmations(
        &self,
        chain: ChainType,
        tx_block_number: u64,
    ) -> Result<u32, MonitorError> {
        let Some(client) = self.client_for(chain) else {
            return Ok(0);
        };
        let tip = client.current_block_height().await?;
        let depth = tip.saturating_sub(tx_block_number).saturating_add(1);
        Ok(u32::try_from(depth).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubClient {
        transfers: Vec<Transaction>,
        case_insensitive: bool,
    }

    #[async_trait]
    impl ChainExplorerClient for StubClient {
        async fn recent_transfers(&self, _to_address: &str) -> Result<Vec<Transaction>, MonitorError> {
            Ok(self.transfers.clone())
        }

        async fn current_block_height(&self) -> Result<u64, MonitorError> {
            Ok(1000)
        }

        fn case_insensitive_addresses(&self) -> bool {
            self.case_insensitive
        }
    }

    fn tx(amount: i64, to: &str, ts: DateTime<Utc>) -> Transaction {
        Transaction {
            hash: "0xabc".into(),
            block_number: 100,
            amount_raw: amount,
            to_address: to.into(),
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn finds_exact_amount_match_case_insensitive() {
        let now = Utc::now();
        let mut clients: HashMap<ChainType, Arc<dyn ChainExplorerClient>> = HashMap::new();
        clients.insert(
            ChainType::Pol,
            Arc::new(StubClient {
                transfers: vec![tx(10_001_300, "0xABC", now)],
                case_insensitive: true,
            }),
        );
        let monitor = CompositeMonitor::new(clients);
        let found = monitor
            .find_transaction(ChainType::Pol, "0xabc", 10_001_300, now - chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn rejects_amount_off_by_one() {
        let now = Utc::now();
        let mut clients: HashMap<ChainType, Arc<dyn ChainExplorerClient>> = HashMap::new();
        clients.insert(
            ChainType::Pol,
            Arc::new(StubClient {
                transfers: vec![tx(10_001_301, "0xabc", now)],
                case_insensitive: true,
            }),
        );
        let monitor = CompositeMonitor::new(clients);
        let found = monitor
            .find_transaction(ChainType::Pol, "0xabc", 10_001_300, now - chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn rejects_transfer_older_than_created_after_minus_skew() {
        let created_after = Utc::now();
        let stale = created_after - chrono::Duration::seconds(31);
        let mut clients: HashMap<ChainType, Arc<dyn ChainExplorerClient>> = HashMap::new();
        clients.insert(
            ChainType::Pol,
            Arc::new(StubClient {
                transfers: vec![tx(10_001_300, "0xabc", stale)],
                case_insensitive: true,
            }),
        );
        let monitor = CompositeMonitor::new(clients);
        let found = monitor
            .find_transaction(ChainType::Pol, "0xabc", 10_001_300, created_after)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn within_skew_window_still_matches() {
        let created_after = Utc::now();
        let within = created_after - chrono::Duration::seconds(29);
        let mut clients: HashMap<ChainType, Arc<dyn ChainExplorerClient>> = HashMap::new();
        clients.insert(
            ChainType::Pol,
            Arc::new(StubClient {
                transfers: vec![tx(10_001_300, "0xabc", within)],
                case_insensitive: true,
            }),
        );
        let monitor = CompositeMonitor::new(clients);
        let found = monitor
            .find_transaction(ChainType::Pol, "0xabc", 10_001_300, created_after)
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn missing_client_returns_none_not_error() {
        let monitor = CompositeMonitor::new(HashMap::new());
        let found = monitor
            .find_transaction(ChainType::Trc, "Txxx", 1, Utc::now())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn confirmation_depth_is_tip_minus_tx_block_plus_one() {
        let mut clients: HashMap<ChainType, Arc<dyn ChainExplorerClient>> = HashMap::new();
        clients.insert(
            ChainType::Pol,
            Arc::new(StubClient {
                transfers: vec![],
                case_insensitive: true,
            }),
        );
        let monitor = CompositeMonitor::new(clients);
        // StubClient::current_block_height returns 1000.
        let depth = monitor.get_confirmations(ChainType::Pol, 989).await.unwrap();
        assert_eq!(depth, 12);
    }

    #[tokio::test]
    async fn confirmation_depth_for_tx_in_tip_block_is_one() {
        let mut clients: HashMap<ChainType, Arc<dyn ChainExplorerClient>> = HashMap::new();
        clients.insert(
            ChainType::Pol,
            Arc::new(StubClient {
                transfers: vec![],
                case_insensitive: true,
            }),
        );
        let monitor = CompositeMonitor::new(clients);
        let depth = monitor.get_confirmations(ChainType::Pol, 1000).await.unwrap();
        assert_eq!(depth, 1);
    }

    #[tokio::test]
    async fn tron_address_match_is_case_sensitive() {
        let now = Utc::now();
        let mut clients: HashMap<ChainType, Arc<dyn ChainExplorerClient>> = HashMap::new();
        clients.insert(
            ChainType::Trc,
            Arc::new(StubClient {
                transfers: vec![tx(10_001_300, "Txxxlower", now)],
                case_insensitive: false,
            }),
        );
        let monitor = CompositeMonitor::new(clients);
        let found = monitor
            .find_transaction(ChainType::Trc, "TXXXLOWER", 10_001_300, now - chrono::Duration::minutes(1))
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
