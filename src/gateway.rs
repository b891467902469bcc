//! Payment gateway port + the bespoke USDT gateway.

use crate::error::BillingError;
use crate::exchange_rate::ExchangeRateService;
use crate::money::Money;
use crate::payment_method::{ChainType, PaymentMethod};
use crate::suffix_allocator::{round_to_base, SuffixAllocator};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// What a fiat `CreatePayment` call needs to hand the gateway.
#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub order_no: String,
    pub amount: Money,
    pub subject: String,
    pub return_url: Option<String>,
}

/// What a fiat gateway returns once a payment has been opened on its side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayPaymentInfo {
    pub gateway_order_no: String,
    pub payment_url: Option<String>,
    pub qr_code: Option<String>,
}

/// An opaque inbound callback request. The adapter owns parsing and
/// signature verification; the core only ever sees the verified result.
#[derive(Debug, Clone)]
pub struct InboundCallback {
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
    Success,
    Failure(String),
}

/// The verified, normalized result of a gateway callback.
#[derive(Debug, Clone)]
pub struct CallbackData {
    pub gateway_order_no: String,
    pub transaction_id: String,
    pub amount_smallest_unit: i64,
    pub currency: String,
    pub status: CallbackStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
}

/// Fiat payment gateway boundary: open a payment, verify a callback.
///
/// Signature verification is entirely the adapter's job; any failure —
/// bad signature, malformed body, unknown merchant key — collapses to a
/// single [`BillingError::Upstream`] so the use case doesn't need to know
/// which gateway it's talking to.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(
        &self,
        req: &CreatePaymentRequest,
    ) -> Result<GatewayPaymentInfo, BillingError>;

    async fn verify_callback(
        &self,
        inbound: &InboundCallback,
    ) -> Result<CallbackData, BillingError>;
}

/// Receiving-address pool and TTL for the USDT gateway, swapped as a whole
/// under a writer lock on hot-reload.
#[derive(Debug, Clone)]
pub struct UsdtGatewayConfig {
    pub address_pool: HashMap<ChainType, Vec<String>>,
    pub reservation_ttl: Duration,
}

impl UsdtGatewayConfig {
    pub fn new(address_pool: HashMap<ChainType, Vec<String>>, reservation_ttl: Duration) -> Self {
        UsdtGatewayConfig {
            address_pool,
            reservation_ttl,
        }
    }
}

/// Everything `CreateUSDTPayment` needs to hand back to `CreatePayment`,
/// and to `ReleaseSuffix` on a later failure in the same flow.
#[derive(Debug, Clone, PartialEq)]
pub struct UsdtPaymentInfo {
    pub chain: ChainType,
    pub receiving_address: String,
    pub base_amount_raw: i64,
    pub suffix: u32,
    pub amount_raw: i64,
    pub exchange_rate: f64,
    pub expired_at: DateTime<Utc>,
}

/// Composes the exchange-rate port and the suffix allocator into the
/// USDT-specific creation routine. Not a [`PaymentGateway`] — it has its
/// own entry point, `create_usdt_payment`.
pub struct UsdtGateway {
    exchange_rate: Arc<dyn ExchangeRateService>,
    allocator: Arc<dyn SuffixAllocator>,
    config: RwLock<Arc<UsdtGatewayConfig>>,
}

impl UsdtGateway {
    pub fn new(
        exchange_rate: Arc<dyn ExchangeRateService>,
        allocator: Arc<dyn SuffixAllocator>,
        config: UsdtGatewayConfig,
    ) -> Self {
        UsdtGateway {
            exchange_rate,
            allocator,
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Atomically replaces the whole configuration. A single pointer swap
    /// under the writer lock; readers never observe a torn config.
    pub fn update_config(&self, config: UsdtGatewayConfig) {
        let mut guard = self.config.write().expect("config lock poisoned");
        *guard = Arc::new(config);
    }

    fn snapshot_config(&self) -> Arc<UsdtGatewayConfig> {
        self.config.read().expect("config lock poisoned").clone()
    }

    #[tracing::instrument(skip(self), fields(payment_id, payment_method = %payment_method))]
    pub async fn create_usdt_payment(
        &self,
        payment_id: u64,
        cny_amount_cents: i64,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<UsdtPaymentInfo, BillingError> {
        let chain = payment_method
            .chain_type()
            .ok_or_else(|| BillingError::validation("payment method is not a USDT method"))?;

        let config = self.snapshot_config();
        let candidates = config.address_pool.get(&chain).cloned().unwrap_or_default();
        let valid_addresses: Vec<String> = candidates
            .into_iter()
            .filter(|addr| {
                let ok = chain.is_valid_address(addr);
                if !ok {
                    tracing::warn!(address = %addr, chain = %chain, "dropping malformed receiving address");
                }
                ok
            })
            .collect();
        if valid_addresses.is_empty() {
            return Err(BillingError::internal(format!(
                "no valid receiving addresses configured for chain {chain}"
            )));
        }

        let quote = self
            .exchange_rate
            .cny_to_usdt(cny_amount_cents)
            .await
            .map_err(|e| BillingError::upstream(e.to_string()))?;
        let base = round_to_base(quote.usdt_amount_raw);

        let allocation = self
            .allocator
            .allocate(
                chain,
                &valid_addresses,
                base,
                payment_id,
                config.reservation_ttl,
            )
            .await
            .map_err(|e| BillingError::conflict(e.to_string()))?;

        let display_rate = match self.exchange_rate.cny_to_usdt(cny_amount_cents).await {
            Ok(requote) => requote.rate,
            Err(e) => {
                tracing::warn!(error = %e, "second exchange-rate read failed; recording rate 0");
                0.0
            }
        };

        Ok(UsdtPaymentInfo {
            chain,
            receiving_address: allocation.chosen_address,
            base_amount_raw: allocation.base_amount_raw,
            suffix: allocation.suffix,
            amount_raw: allocation.full_amount_raw,
            exchange_rate: display_rate,
            expired_at: now + config.reservation_ttl,
        })
    }

    /// Compensating action: releases a reservation made by a USDT creation
    /// attempt that failed further down the pipeline (e.g. persistence).
    pub async fn release_suffix(&self, info: &UsdtPaymentInfo) {
        self.allocator
            .release(
                info.chain,
                &info.receiving_address,
                info.base_amount_raw,
                info.suffix,
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange_rate::FixedExchangeRateService;
    use crate::suffix_allocator::InMemorySuffixAllocator;

    fn gateway_with_pool(addresses: Vec<&str>) -> UsdtGateway {
        let mut pool = HashMap::new();
        pool.insert(
            ChainType::Pol,
            addresses.into_iter().map(String::from).collect(),
        );
        UsdtGateway::new(
            Arc::new(FixedExchangeRateService::new(1000, 1)),
            Arc::new(InMemorySuffixAllocator::new()),
            UsdtGatewayConfig::new(pool, Duration::minutes(10)),
        )
    }

    #[tokio::test]
    async fn creates_usdt_payment_with_valid_address() {
        let gw = gateway_with_pool(vec!["0x1234567890123456789012345678901234567890"]);
        let info = gw
            .create_usdt_payment(1, 9900, PaymentMethod::UsdtPol, Utc::now())
            .await
            .unwrap();
        assert_eq!(info.chain, ChainType::Pol);
        assert_eq!(
            info.amount_raw,
            info.base_amount_raw + info.suffix as i64 * 100
        );
        assert!(info.suffix >= 1 && info.suffix <= 9999);
    }

    #[tokio::test]
    async fn rejects_non_usdt_method() {
        let gw = gateway_with_pool(vec!["0x1234567890123456789012345678901234567890"]);
        let err = gw
            .create_usdt_payment(1, 9900, PaymentMethod::Alipay, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[tokio::test]
    async fn drops_malformed_addresses_and_fails_if_none_remain() {
        let gw = gateway_with_pool(vec!["not-an-address"]);
        let err = gw
            .create_usdt_payment(1, 9900, PaymentMethod::UsdtPol, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Internal(_)));
    }

    #[tokio::test]
    async fn suffix_exhaustion_surfaces_as_conflict() {
        let gw = gateway_with_pool(vec!["0x1234567890123456789012345678901234567890"]);
        for pid in 1..=9999u64 {
            gw.create_usdt_payment(pid, 9900, PaymentMethod::UsdtPol, Utc::now())
                .await
                .unwrap();
        }
        let err = gw
            .create_usdt_payment(10_000, 9900, PaymentMethod::UsdtPol, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Conflict(_)));
    }

    #[tokio::test]
    async fn release_then_reallocate_succeeds() {
        let gw = gateway_with_pool(vec!["0x1234567890123456789012345678901234567890"]);
        let info = gw
            .create_usdt_payment(1, 9900, PaymentMethod::UsdtPol, Utc::now())
            .await
            .unwrap();
        gw.release_suffix(&info).await;
        // Freed slot should be reusable without exhausting the whole space.
        let info2 = gw
            .create_usdt_payment(2, 9900, PaymentMethod::UsdtPol, Utc::now())
            .await
            .unwrap();
        assert!(info2.suffix >= 1 && info2.suffix <= 9999);
    }

    #[tokio::test]
    async fn update_config_swaps_address_pool_atomically() {
        let gw = gateway_with_pool(vec!["0x1234567890123456789012345678901234567890"]);
        let mut new_pool = HashMap::new();
        new_pool.insert(
            ChainType::Trc,
            vec!["TLsV52sRDL79HXGGm9yzwKibb6BeruhUzy".to_string()],
        );
        gw.update_config(UsdtGatewayConfig::new(new_pool, Duration::minutes(5)));
        let err = gw
            .create_usdt_payment(1, 9900, PaymentMethod::UsdtPol, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Internal(_)));
        let ok = gw
            .create_usdt_payment(1, 9900, PaymentMethod::UsdtTrc, Utc::now())
            .await
            .unwrap();
        assert_eq!(ok.chain, ChainType::Trc);
    }
}
