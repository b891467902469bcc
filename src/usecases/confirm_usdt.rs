//! Serialized USDT confirmation poller: walks pending USDT payments in
//! sequence, checking each against the blockchain monitor.

use crate::config::{ConfirmWorkerConfig, HotReloadable};
use crate::error::BillingError;
use crate::monitor::BlockchainMonitor;
use crate::payment::Payment;
use crate::repository::PaymentRepository;
use crate::subscription::SubscriptionActivationPort;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What happened to one pending USDT payment during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// No matching on-chain transfer yet.
    NotYetSeen,
    /// A transfer was found but has not reached the required depth.
    AwaitingConfirmations,
    /// A transfer was found but postdates the expiration grace window.
    StaleTransfer,
    /// The payment was confirmed and marked paid this sweep.
    Confirmed,
}

/// Tally of one worker invocation, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmUsdtSummary {
    pub not_yet_seen: u32,
    pub awaiting_confirmations: u32,
    pub stale_transfer: u32,
    pub confirmed: u32,
    pub errored: u32,
    pub cancelled_early: bool,
}

pub struct ConfirmUsdtWorker<PayR> {
    payments: Arc<PayR>,
    monitor: Arc<dyn BlockchainMonitor>,
    activator: Arc<dyn SubscriptionActivationPort>,
    config: Arc<HotReloadable<ConfirmWorkerConfig>>,
    /// Fixed grace window past `expired_at` beyond which a found transfer is
    /// considered stale. Not itself hot-reloadable.
    expiry_grace: Duration,
    execute_mutex: tokio::sync::Mutex<()>,
}

impl<PayR> ConfirmUsdtWorker<PayR>
where
    PayR: PaymentRepository,
{
    pub fn new(
        payments: Arc<PayR>,
        monitor: Arc<dyn BlockchainMonitor>,
        activator: Arc<dyn SubscriptionActivationPort>,
        config: Arc<HotReloadable<ConfirmWorkerConfig>>,
        expiry_grace_hours: i64,
    ) -> Self {
        ConfirmUsdtWorker {
            payments,
            monitor,
            activator,
            config,
            expiry_grace: Duration::hours(expiry_grace_hours),
            execute_mutex: tokio::sync::Mutex::new(()),
        }
    }

    /// Runs one sweep. Serialized against other calls on the same worker by
    /// `execute_mutex` — a concurrent invocation waits for this one to
    /// finish rather than running in parallel, so no payment is ever
    /// double-confirmed.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<ConfirmUsdtSummary, BillingError> {
        let _guard = self.execute_mutex.lock().await;
        let config = self.config.load();
        let pending = self.payments.find_pending_usdt().await?;
        let mut summary = ConfirmUsdtSummary::default();

        let mut iter = pending.into_iter().peekable();
        while let Some(mut payment) = iter.next() {
            if cancel.is_cancelled() {
                summary.cancelled_early = true;
                break;
            }
            match self.check_payment(&mut payment, &config, now).await {
                Ok(PaymentOutcome::NotYetSeen) => summary.not_yet_seen += 1,
                Ok(PaymentOutcome::AwaitingConfirmations) => summary.awaiting_confirmations += 1,
                Ok(PaymentOutcome::StaleTransfer) => summary.stale_transfer += 1,
                Ok(PaymentOutcome::Confirmed) => summary.confirmed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, payment_id = payment.id, "confirm-usdt check failed");
                    summary.errored += 1;
                }
            }

            if iter.peek().is_none() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(config.inter_request_delay()) => {}
                _ = cancel.cancelled() => {
                    summary.cancelled_early = true;
                    break;
                }
            }
        }
        Ok(summary)
    }

    async fn check_payment(
        &self,
        payment: &mut Payment,
        config: &ConfirmWorkerConfig,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome, BillingError> {
        let (chain, amount_raw, address) = match (
            payment.chain_type,
            payment.usdt_amount_raw,
            payment.receiving_address.clone(),
        ) {
            (Some(c), Some(a), Some(addr)) if payment.payment_method.is_usdt() => (c, a, addr),
            _ => {
                return Err(BillingError::internal(format!(
                    "payment {} is pending-usdt but missing chain fields",
                    payment.id
                )))
            }
        };

        let Some(tx) = self
            .monitor
            .find_transaction(chain, &address, amount_raw, payment.created_at)
            .await
            .map_err(|e| BillingError::upstream(e.to_string()))?
        else {
            return Ok(PaymentOutcome::NotYetSeen);
        };

        if tx.timestamp > payment.expired_at + self.expiry_grace {
            tracing::warn!(
                payment_id = payment.id,
                tx_hash = %tx.hash,
                "found transfer postdates expiration grace window; ignoring"
            );
            return Ok(PaymentOutcome::StaleTransfer);
        }

        let confirmations = self
            .monitor
            .get_confirmations(chain, tx.block_number)
            .await
            .map_err(|e| BillingError::upstream(e.to_string()))?;
        let required = config.confirmation_requirements.required_confirmations(chain);
        if confirmations < required {
            return Ok(PaymentOutcome::AwaitingConfirmations);
        }

        payment.set_activation_pending(true, now);
        payment
            .confirm_usdt_transaction(tx.hash.clone(), tx.block_number, now)
            .map_err(BillingError::from)?;
        self.payments.save(payment).await?;

        match self.activator.activate(payment.subscription_id, now).await {
            Ok(()) => {
                payment.set_activation_pending(false, now);
                payment.set_activation_error(None, now);
                self.payments.save(payment).await?;
            }
            Err(e) => {
                tracing::warn!(error = %e, payment_id = payment.id, "subscription activation failed; will retry");
                payment.set_activation_error(Some(e.to_string()), now);
                self.payments.save(payment).await?;
            }
        }
        Ok(PaymentOutcome::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{MonitorError, Transaction};
    use crate::money::Money;
    use crate::payment::{Payment, PaymentStatus, SequentialOrderNoGenerator};
    use crate::payment_method::{ChainType, PaymentMethod};
    use crate::repository::memory::InMemoryPaymentRepository;
    use crate::subscription::memory::InMemorySubscriptionRepository;
    use crate::subscription::{RepositorySubscriptionActivator, Subscription};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct StubMonitor {
        transaction: StdMutex<Option<Transaction>>,
        confirmations: StdMutex<u32>,
    }

    #[async_trait]
    impl BlockchainMonitor for StubMonitor {
        async fn find_transaction(
            &self,
            _chain: ChainType,
            _to_address: &str,
            _expected_amount_raw: i64,
            _created_after: DateTime<Utc>,
        ) -> Result<Option<Transaction>, MonitorError> {
            Ok(self.transaction.lock().unwrap().clone())
        }

        async fn get_confirmations(
            &self,
            _chain: ChainType,
            _tx_block_number: u64,
        ) -> Result<u32, MonitorError> {
            Ok(*self.confirmations.lock().unwrap())
        }
    }

    fn usdt_payment(now: DateTime<Utc>) -> Payment {
        let gen = SequentialOrderNoGenerator::new();
        let amount = Money::new(9900, "CNY").unwrap();
        let mut p = Payment::new(1, 42, 7, amount, PaymentMethod::UsdtPol, &gen, now).unwrap();
        p.set_usdt_info(
            ChainType::Pol,
            10_001_300,
            "0x1234567890123456789012345678901234567890",
            7.2,
            now,
        );
        p
    }

    fn worker(
        monitor: StubMonitor,
        payments: Arc<InMemoryPaymentRepository>,
        subscriptions: Arc<InMemorySubscriptionRepository>,
    ) -> ConfirmUsdtWorker<InMemoryPaymentRepository> {
        let activator = Arc::new(RepositorySubscriptionActivator::new(subscriptions));
        ConfirmUsdtWorker::new(
            payments,
            Arc::new(monitor),
            activator,
            Arc::new(HotReloadable::new(ConfirmWorkerConfig {
                inter_request_delay_secs: 0,
                ..Default::default()
            })),
            1,
        )
    }

    #[tokio::test]
    async fn no_transaction_found_yet_is_not_an_error() {
        let now = Utc::now();
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&usdt_payment(now)).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(42, 7, 1, now));
        let w = worker(
            StubMonitor {
                transaction: StdMutex::new(None),
                confirmations: StdMutex::new(0),
            },
            payments.clone(),
            subscriptions,
        );
        let summary = w.run(now, CancellationToken::new()).await.unwrap();
        assert_eq!(summary.not_yet_seen, 1);
        assert_eq!(summary.confirmed, 0);
    }

    #[tokio::test]
    async fn below_required_confirmations_waits() {
        let now = Utc::now();
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&usdt_payment(now)).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(42, 7, 1, now));
        let w = worker(
            StubMonitor {
                transaction: StdMutex::new(Some(Transaction {
                    hash: "0xabc".into(),
                    block_number: 100,
                    amount_raw: 10_001_300,
                    to_address: "0x1234567890123456789012345678901234567890".into(),
                    timestamp: now,
                })),
                confirmations: StdMutex::new(1),
            },
            payments.clone(),
            subscriptions,
        );
        let summary = w.run(now, CancellationToken::new()).await.unwrap();
        assert_eq!(summary.awaiting_confirmations, 1);
        let p = payments.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn sufficient_confirmations_marks_paid_and_activates() {
        let now = Utc::now();
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&usdt_payment(now)).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(42, 7, 1, now));
        let w = worker(
            StubMonitor {
                transaction: StdMutex::new(Some(Transaction {
                    hash: "0xabc".into(),
                    block_number: 100,
                    amount_raw: 10_001_300,
                    to_address: "0x1234567890123456789012345678901234567890".into(),
                    timestamp: now,
                })),
                confirmations: StdMutex::new(12),
            },
            payments.clone(),
            subscriptions.clone(),
        );
        let summary = w.run(now, CancellationToken::new()).await.unwrap();
        assert_eq!(summary.confirmed, 1);
        let p = payments.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Paid);
        assert_eq!(p.tx_hash.as_deref(), Some("0xabc"));
        let s = subscriptions.find_by_id(42).await.unwrap().unwrap();
        assert_eq!(s.status, crate::subscription::SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn transfer_past_expiry_grace_is_ignored() {
        let now = Utc::now();
        let mut p = usdt_payment(now);
        p.expired_at = now - Duration::hours(2);
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&p).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(42, 7, 1, now));
        let w = worker(
            StubMonitor {
                transaction: StdMutex::new(Some(Transaction {
                    hash: "0xabc".into(),
                    block_number: 100,
                    amount_raw: 10_001_300,
                    to_address: "0x1234567890123456789012345678901234567890".into(),
                    timestamp: now,
                })),
                confirmations: StdMutex::new(99),
            },
            payments.clone(),
            subscriptions,
        );
        let summary = w.run(now, CancellationToken::new()).await.unwrap();
        assert_eq!(summary.stale_transfer, 1);
        let reloaded = payments.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(reloaded.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn pre_cancelled_token_stops_before_processing_any_payment() {
        let now = Utc::now();
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&usdt_payment(now)).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(42, 7, 1, now));
        let w = worker(
            StubMonitor {
                transaction: StdMutex::new(None),
                confirmations: StdMutex::new(0),
            },
            payments,
            subscriptions,
        );
        let token = CancellationToken::new();
        token.cancel();
        let summary = w.run(now, token).await.unwrap();
        assert!(summary.cancelled_early);
        assert_eq!(summary.not_yet_seen, 0);
    }
}
