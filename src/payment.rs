//! The payment aggregate and its FSM.
//!
//! `now` is threaded through every mutator explicitly rather than read from
//! the system clock internally — this keeps the aggregate a pure state
//! machine (no ambient singleton) and lets a use case stamp every payment
//! it touches in one invocation with the same instant.

use crate::error::TransitionError;
use crate::money::Money;
use crate::payment_method::{ChainType, PaymentMethod};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Default payment TTL: the window in which a fiat or USDT payment must
/// complete before it is eligible for expiration.
pub const DEFAULT_PAYMENT_TTL_MINUTES: i64 = 30;

/// Metadata key for the reason a payment failed.
pub const META_FAILURE_REASON: &str = "failure_reason";
/// Metadata key marking that a paid payment's subscription activation is
/// still outstanding.
pub const META_ACTIVATION_PENDING: &str = "subscription_activation_pending";
/// Metadata key holding the last activation error, if retrying.
pub const META_ACTIVATION_ERROR: &str = "subscription_activation_error";

/// The four-state payment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

impl PaymentStatus {
    /// True for any of the three states the FSM never leaves.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            PaymentStatus::Paid | PaymentStatus::Failed | PaymentStatus::Expired
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A generator of externally-visible order numbers, injected so the
/// aggregate never reaches for a global counter or RNG directly.
pub trait OrderNoGenerator: Send + Sync {
    /// Returns a fresh order number, conventionally prefixed `PAY`.
    fn next_order_no(&self) -> String;
}

/// A generator of internal payment ids. Kept separate from `order_no`
/// since the id is storage-internal while `order_no` is externally
/// visible — most real deployments back this with the store's own
/// auto-increment/sequence rather than an in-process counter.
pub trait PaymentIdAllocator: Send + Sync {
    fn next_payment_id(&self) -> u64;
}

/// An in-process [`PaymentIdAllocator`], suitable for the in-memory
/// repository and tests.
pub struct AtomicPaymentIdAllocator {
    counter: std::sync::atomic::AtomicU64,
}

impl AtomicPaymentIdAllocator {
    pub fn new() -> Self {
        AtomicPaymentIdAllocator {
            counter: std::sync::atomic::AtomicU64::new(1),
        }
    }
}

impl Default for AtomicPaymentIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentIdAllocator for AtomicPaymentIdAllocator {
    fn next_payment_id(&self) -> u64 {
        self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

/// Invariant-bearing payment aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: u64,
    pub order_no: String,
    pub subscription_id: u64,
    pub user_id: u64,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,

    pub gateway_order_no: Option<String>,
    pub transaction_id: Option<String>,
    pub payment_url: Option<String>,
    pub qr_code: Option<String>,

    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub chain_type: Option<ChainType>,
    pub usdt_amount_raw: Option<i64>,
    pub receiving_address: Option<String>,
    pub exchange_rate: Option<f64>,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub confirmed_at: Option<DateTime<Utc>>,

    pub metadata: BTreeMap<String, Value>,
    pub version: u64,
}

impl Payment {
    /// Constructs a new pending payment. Requires non-zero subscription id,
    /// non-zero user id, and a positive amount (enforced by [`Money`]
    /// already having been constructed).
    pub fn new(
        id: u64,
        subscription_id: u64,
        user_id: u64,
        amount: Money,
        payment_method: PaymentMethod,
        order_no_gen: &dyn OrderNoGenerator,
        now: DateTime<Utc>,
    ) -> Result<Self, crate::error::BillingError> {
        if subscription_id == 0 {
            return Err(crate::error::BillingError::validation(
                "subscription_id must be non-zero",
            ));
        }
        if user_id == 0 {
            return Err(crate::error::BillingError::validation(
                "user_id must be non-zero",
            ));
        }
        Ok(Payment {
            id,
            order_no: order_no_gen.next_order_no(),
            subscription_id,
            user_id,
            amount,
            payment_method,
            status: PaymentStatus::Pending,
            gateway_order_no: None,
            transaction_id: None,
            payment_url: None,
            qr_code: None,
            paid_at: None,
            expired_at: now + Duration::minutes(DEFAULT_PAYMENT_TTL_MINUTES),
            created_at: now,
            updated_at: now,
            chain_type: None,
            usdt_amount_raw: None,
            receiving_address: None,
            exchange_rate: None,
            tx_hash: None,
            block_number: None,
            confirmed_at: None,
            metadata: BTreeMap::new(),
            version: 0,
        })
    }

    /// `now > expired_at AND status == pending`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expired_at && self.status == PaymentStatus::Pending
    }

    /// `pending -> paid`. Idempotent no-op on `paid`, preserving the
    /// original `transaction_id` and `version`. Rejected from `failed`/`expired`.
    pub fn mark_as_paid(
        &mut self,
        transaction_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        match self.status {
            PaymentStatus::Pending => {
                self.status = PaymentStatus::Paid;
                self.transaction_id = Some(transaction_id.into());
                self.paid_at = Some(now);
                self.updated_at = now;
                self.version += 1;
                Ok(())
            }
            PaymentStatus::Paid => Ok(()),
            _ => Err(TransitionError {
                verb: "mark as paid",
                from: self.status,
            }),
        }
    }

    /// `pending -> failed`. Rejected from any final state (including `failed`).
    pub fn mark_as_failed(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status.is_final() {
            return Err(TransitionError {
                verb: "mark as failed",
                from: self.status,
            });
        }
        self.status = PaymentStatus::Failed;
        self.metadata
            .insert(META_FAILURE_REASON.to_string(), Value::String(reason.into()));
        self.updated_at = now;
        self.version += 1;
        Ok(())
    }

    /// `pending -> expired`. This is the only transition that never errors:
    /// it is a no-op on every final state, keeping whatever status was there.
    pub fn mark_as_expired(&mut self, now: DateTime<Utc>) {
        if self.status == PaymentStatus::Pending {
            self.status = PaymentStatus::Expired;
            self.updated_at = now;
            self.version += 1;
        }
    }

    /// Confirms an on-chain USDT transfer. Requires `is_usdt` and `pending`.
    pub fn confirm_usdt_transaction(
        &mut self,
        tx_hash: impl Into<String>,
        block_number: u64,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.payment_method.is_usdt() {
            return Err(TransitionError {
                verb: "confirm USDT transaction on non-USDT",
                from: self.status,
            });
        }
        if self.status != PaymentStatus::Pending {
            return Err(TransitionError {
                verb: "confirm USDT transaction",
                from: self.status,
            });
        }
        let tx_hash = tx_hash.into();
        self.tx_hash = Some(tx_hash.clone());
        self.block_number = Some(block_number);
        self.confirmed_at = Some(now);
        self.paid_at = Some(now);
        self.transaction_id = Some(tx_hash);
        self.status = PaymentStatus::Paid;
        self.updated_at = now;
        self.version += 1;
        Ok(())
    }

    /// Populates fiat gateway fields. Legal in any state; conventionally
    /// called once, pre-persistence.
    pub fn set_gateway_info(
        &mut self,
        gateway_order_no: impl Into<String>,
        payment_url: impl Into<String>,
        qr_code: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.gateway_order_no = Some(gateway_order_no.into());
        self.payment_url = Some(payment_url.into());
        self.qr_code = qr_code;
        self.updated_at = now;
    }

    /// Populates USDT-specific fields ahead of persistence.
    pub fn set_usdt_info(
        &mut self,
        chain: ChainType,
        amount_raw: i64,
        address: impl Into<String>,
        exchange_rate: f64,
        now: DateTime<Utc>,
    ) {
        self.chain_type = Some(chain);
        self.usdt_amount_raw = Some(amount_raw);
        self.receiving_address = Some(address.into());
        self.exchange_rate = Some(exchange_rate);
        self.updated_at = now;
    }

    /// Compares the callback's reported amount/currency against this
    /// payment's own. Never mutates. Amount is checked first.
    pub fn validate_callback_amount(
        &self,
        amount_smallest_unit: i64,
        currency: &str,
    ) -> Result<(), String> {
        if self.amount.amount_smallest_unit() != amount_smallest_unit {
            return Err("amount mismatch".to_string());
        }
        if self.amount.currency() != currency.to_ascii_uppercase() {
            return Err("currency mismatch".to_string());
        }
        Ok(())
    }

    pub fn set_activation_pending(&mut self, pending: bool, now: DateTime<Utc>) {
        if pending {
            self.metadata
                .insert(META_ACTIVATION_PENDING.to_string(), Value::Bool(true));
        } else {
            self.metadata.remove(META_ACTIVATION_PENDING);
        }
        self.updated_at = now;
    }

    pub fn is_activation_pending(&self) -> bool {
        matches!(
            self.metadata.get(META_ACTIVATION_PENDING),
            Some(Value::Bool(true))
        )
    }

    pub fn set_activation_error(&mut self, error: Option<String>, now: DateTime<Utc>) {
        match error {
            Some(msg) => {
                self.metadata
                    .insert(META_ACTIVATION_ERROR.to_string(), Value::String(msg));
            }
            None => {
                self.metadata.remove(META_ACTIVATION_ERROR);
            }
        }
        self.updated_at = now;
    }
}

/// Simple counter-based [`OrderNoGenerator`] suitable for a single-process
/// test or demo; production deployments inject one backed by a durable
/// sequence or ULID/UUID source.
pub struct SequentialOrderNoGenerator {
    counter: std::sync::atomic::AtomicU64,
    prefix: &'static str,
}

impl SequentialOrderNoGenerator {
    pub fn new() -> Self {
        SequentialOrderNoGenerator {
            counter: std::sync::atomic::AtomicU64::new(1),
            prefix: "PAY",
        }
    }
}

impl Default for SequentialOrderNoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderNoGenerator for SequentialOrderNoGenerator {
    fn next_order_no(&self) -> String {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("{}_{:016}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn new_payment(method: PaymentMethod) -> Payment {
        let gen = SequentialOrderNoGenerator::new();
        let amount = Money::new(9900, "CNY").unwrap();
        Payment::new(1, 42, 7, amount, method, &gen, now()).unwrap()
    }

    #[test]
    fn constructor_rejects_zero_ids() {
        let gen = SequentialOrderNoGenerator::new();
        let amount = Money::new(9900, "CNY").unwrap();
        assert!(Payment::new(1, 0, 7, amount, PaymentMethod::Alipay, &gen, now()).is_err());
        assert!(Payment::new(1, 42, 0, amount, PaymentMethod::Alipay, &gen, now()).is_err());
    }

    #[test]
    fn constructor_sets_pending_and_expiry() {
        let t = now();
        let gen = SequentialOrderNoGenerator::new();
        let amount = Money::new(9900, "CNY").unwrap();
        let p = Payment::new(1, 42, 7, amount, PaymentMethod::Alipay, &gen, t).unwrap();
        assert_eq!(p.status, PaymentStatus::Pending);
        assert_eq!(p.expired_at, t + Duration::minutes(30));
        assert!(p.order_no.starts_with("PAY_"));
        assert_eq!(p.version, 0);
    }

    #[test]
    fn mark_as_paid_sets_fields_and_bumps_version() {
        let mut p = new_payment(PaymentMethod::Alipay);
        let t = now();
        p.mark_as_paid("TX1", t).unwrap();
        assert_eq!(p.status, PaymentStatus::Paid);
        assert_eq!(p.transaction_id.as_deref(), Some("TX1"));
        assert_eq!(p.paid_at, Some(t));
        assert_eq!(p.version, 1);
    }

    #[test]
    fn mark_as_paid_on_paid_is_idempotent_preserving_tx_id() {
        let mut p = new_payment(PaymentMethod::Alipay);
        p.mark_as_paid("TX1", now()).unwrap();
        let version_after_first = p.version;
        p.mark_as_paid("TX2", now()).unwrap();
        assert_eq!(p.transaction_id.as_deref(), Some("TX1"));
        assert_eq!(p.version, version_after_first);
    }

    #[test]
    fn mark_as_paid_rejected_from_failed_and_expired() {
        let mut p = new_payment(PaymentMethod::Alipay);
        p.mark_as_failed("boom", now()).unwrap();
        assert!(p.mark_as_paid("TX1", now()).is_err());

        let mut p2 = new_payment(PaymentMethod::Alipay);
        p2.mark_as_expired(now());
        assert!(p2.mark_as_paid("TX1", now()).is_err());
    }

    #[test]
    fn mark_as_failed_records_reason_and_rejects_from_final() {
        let mut p = new_payment(PaymentMethod::Alipay);
        p.mark_as_failed("amount mismatch: got 1", now()).unwrap();
        assert_eq!(p.status, PaymentStatus::Failed);
        assert_eq!(
            p.metadata.get(META_FAILURE_REASON).and_then(Value::as_str),
            Some("amount mismatch: got 1")
        );
        assert!(p.mark_as_failed("again", now()).is_err());
    }

    #[test]
    fn mark_as_expired_never_errors_and_is_noop_on_final_states() {
        let mut paid = new_payment(PaymentMethod::Alipay);
        paid.mark_as_paid("TX1", now()).unwrap();
        let version_before = paid.version;
        paid.mark_as_expired(now());
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(paid.version, version_before);

        let mut failed = new_payment(PaymentMethod::Alipay);
        failed.mark_as_failed("x", now()).unwrap();
        let version_before = failed.version;
        failed.mark_as_expired(now());
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert_eq!(failed.version, version_before);

        let mut pending = new_payment(PaymentMethod::Alipay);
        pending.mark_as_expired(now());
        assert_eq!(pending.status, PaymentStatus::Expired);
    }

    #[test]
    fn confirm_usdt_requires_usdt_method_and_pending_status() {
        let mut fiat = new_payment(PaymentMethod::Alipay);
        assert!(fiat.confirm_usdt_transaction("0xabc", 100, now()).is_err());
        assert_eq!(fiat.status, PaymentStatus::Pending);

        let mut usdt = new_payment(PaymentMethod::UsdtPol);
        usdt.mark_as_failed("x", now()).unwrap();
        assert!(usdt.confirm_usdt_transaction("0xabc", 100, now()).is_err());
    }

    #[test]
    fn confirm_usdt_transaction_sets_all_fields() {
        let mut usdt = new_payment(PaymentMethod::UsdtPol);
        let t = now();
        usdt.confirm_usdt_transaction("0xabc", 555, t).unwrap();
        assert_eq!(usdt.status, PaymentStatus::Paid);
        assert_eq!(usdt.tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(usdt.block_number, Some(555));
        assert_eq!(usdt.confirmed_at, Some(t));
        assert_eq!(usdt.paid_at, Some(t));
        assert_eq!(usdt.transaction_id.as_deref(), Some("0xabc"));
        assert_eq!(usdt.version, 1);
    }

    #[test]
    fn validate_callback_amount_never_mutates() {
        let p = new_payment(PaymentMethod::Alipay);
        let before = p.clone();
        assert!(p.validate_callback_amount(9900, "CNY").is_ok());
        assert_eq!(
            p.validate_callback_amount(9901, "CNY").unwrap_err(),
            "amount mismatch"
        );
        assert_eq!(
            p.validate_callback_amount(9900, "USD").unwrap_err(),
            "currency mismatch"
        );
        assert_eq!(p, before);
    }

    #[test]
    fn is_expired_true_only_when_pending_and_past_expiry() {
        let mut p = new_payment(PaymentMethod::Alipay);
        let future = p.expired_at + Duration::minutes(1);
        assert!(p.is_expired(future));
        assert!(!p.is_expired(p.expired_at - Duration::minutes(1)));

        p.mark_as_paid("TX1", now()).unwrap();
        assert!(!p.is_expired(future));
    }

    #[test]
    fn activation_pending_flag_round_trips() {
        let mut p = new_payment(PaymentMethod::Alipay);
        assert!(!p.is_activation_pending());
        p.set_activation_pending(true, now());
        assert!(p.is_activation_pending());
        p.set_activation_pending(false, now());
        assert!(!p.is_activation_pending());
    }
}
