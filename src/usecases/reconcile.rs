//! Expiration, auto-cancel, and activation-retry reconcilers.
//!
//! All three are meant to be driven by an external scheduler (this crate
//! takes no opinion on cron vs. a tokio interval) and are idempotent under
//! repeated execution at the same or a later `now`.

use crate::error::BillingError;
use crate::payment::PaymentStatus;
use crate::repository::PaymentRepository;
use crate::subscription::{
    Subscription, SubscriptionActivationPort, SubscriptionRepository, SubscriptionStatus,
};
use std::collections::HashMap;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpireSummary {
    pub expired_payments: u32,
    pub subscriptions_marked: u32,
}

/// Expires timed-out pending payments, then stamps `payment_expired_at` on
/// each payment's subscription so the auto-cancel reconciler can pick it up.
pub struct ExpirePaymentsUseCase<PayR, SR> {
    payments: Arc<PayR>,
    subscriptions: Arc<SR>,
}

impl<PayR, SR> ExpirePaymentsUseCase<PayR, SR>
where
    PayR: PaymentRepository,
    SR: SubscriptionRepository,
{
    pub fn new(payments: Arc<PayR>, subscriptions: Arc<SR>) -> Self {
        ExpirePaymentsUseCase {
            payments,
            subscriptions,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<ExpireSummary, BillingError> {
        let expired = self.payments.find_expired_pending(now).await?;
        let mut summary = ExpireSummary::default();
        let mut subscription_ids = Vec::with_capacity(expired.len());

        for mut payment in expired {
            payment.mark_as_expired(now);
            self.payments.save(&payment).await?;
            summary.expired_payments += 1;
            subscription_ids.push(payment.subscription_id);
        }

        let by_id: HashMap<u64, Subscription> = self
            .subscriptions
            .find_by_ids(&subscription_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        for subscription_id in subscription_ids {
            match by_id.get(&subscription_id) {
                Some(subscription) => {
                    let mut subscription = subscription.clone();
                    subscription.set_payment_expired_at(now);
                    self.subscriptions.save(&subscription).await?;
                    summary.subscriptions_marked += 1;
                }
                None => {
                    tracing::warn!(subscription_id, "expired payment's subscription not found");
                }
            }
        }
        Ok(summary)
    }
}

const AUTO_CANCEL_GRACE_HOURS: i64 = 24;
const AUTO_CANCEL_INACTIVE_TIMEOUT_HOURS: i64 = 48;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AutoCancelSummary {
    pub cancelled: u32,
    pub skipped_pending_payment: u32,
    pub cleared_stale_flag: u32,
}

/// Cancels subscriptions that never completed a payment within their grace
/// window, skipping any with a currently pending payment.
pub struct AutoCancelUseCase<PayR, SR> {
    payments: Arc<PayR>,
    subscriptions: Arc<SR>,
    grace_period: Duration,
    inactive_timeout: Duration,
}

impl<PayR, SR> AutoCancelUseCase<PayR, SR>
where
    PayR: PaymentRepository,
    SR: SubscriptionRepository,
{
    pub fn new(payments: Arc<PayR>, subscriptions: Arc<SR>) -> Self {
        Self::with_windows(
            payments,
            subscriptions,
            AUTO_CANCEL_GRACE_HOURS,
            AUTO_CANCEL_INACTIVE_TIMEOUT_HOURS,
        )
    }

    pub fn with_windows(
        payments: Arc<PayR>,
        subscriptions: Arc<SR>,
        grace_period_hours: i64,
        inactive_timeout_hours: i64,
    ) -> Self {
        AutoCancelUseCase {
            payments,
            subscriptions,
            grace_period: Duration::hours(grace_period_hours),
            inactive_timeout: Duration::hours(inactive_timeout_hours),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<AutoCancelSummary, BillingError> {
        let candidates = self
            .subscriptions
            .find_by_status(&[SubscriptionStatus::Inactive, SubscriptionStatus::PendingPayment])
            .await?;
        let ids: Vec<u64> = candidates.iter().map(|s| s.id).collect();
        let with_pending_payment = self
            .payments
            .find_subscriptions_with_non_final_payment(&ids)
            .await?;

        let mut summary = AutoCancelSummary::default();
        for mut subscription in candidates {
            if with_pending_payment.contains(&subscription.id) {
                if subscription.payment_expired_at().is_some() {
                    subscription.clear_payment_expired_at();
                    self.subscriptions.save(&subscription).await?;
                    summary.cleared_stale_flag += 1;
                }
                summary.skipped_pending_payment += 1;
                continue;
            }

            let should_cancel = match subscription.payment_expired_at() {
                Some(expired_at) => now > expired_at + self.grace_period,
                None => now > subscription.created_at + self.inactive_timeout,
            };
            if !should_cancel {
                continue;
            }

            let reason = if subscription.payment_expired_at().is_some() {
                "auto-cancelled: payment not completed within grace period"
            } else {
                "auto-cancelled: no payment initiated within timeout period"
            };
            // `cancel` errors only on an already-cancelled subscription; a
            // prior run whose persist failed left this one still
            // cancellable, and a genuinely-already-cancelled one is a
            // harmless no-op retry.
            if subscription.cancel(reason, now).is_ok() {
                self.subscriptions.save(&subscription).await?;
                summary.cancelled += 1;
            }
        }
        Ok(summary)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryActivationSummary {
    pub activated: u32,
    pub still_failing: u32,
}

/// Retries `ActivateSubscription` for paid payments whose activation is
/// still flagged pending, from either a callback or the confirmation
/// worker having previously failed to activate.
pub struct RetryActivationUseCase<PayR> {
    payments: Arc<PayR>,
    activator: Arc<dyn SubscriptionActivationPort>,
}

impl<PayR> RetryActivationUseCase<PayR>
where
    PayR: PaymentRepository,
{
    pub fn new(payments: Arc<PayR>, activator: Arc<dyn SubscriptionActivationPort>) -> Self {
        RetryActivationUseCase { payments, activator }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<RetryActivationSummary, BillingError> {
        let pending = self.payments.find_paid_with_activation_pending().await?;
        let mut summary = RetryActivationSummary::default();

        for mut payment in pending {
            debug_assert_eq!(payment.status, PaymentStatus::Paid);
            match self.activator.activate(payment.subscription_id, now).await {
                Ok(()) => {
                    payment.set_activation_pending(false, now);
                    payment.set_activation_error(None, now);
                    self.payments.save(&payment).await?;
                    summary.activated += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, payment_id = payment.id, "activation retry failed, will retry next tick");
                    payment.set_activation_error(Some(e.to_string()), now);
                    let _ = self.payments.save(&payment).await;
                    summary.still_failing += 1;
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::payment::{Payment, SequentialOrderNoGenerator};
    use crate::payment_method::PaymentMethod;
    use crate::repository::memory::InMemoryPaymentRepository;
    use crate::subscription::memory::InMemorySubscriptionRepository;
    use crate::subscription::{RepositorySubscriptionActivator, Subscription};

    fn payment(id: u64, subscription_id: u64, now: DateTime<Utc>) -> Payment {
        let gen = SequentialOrderNoGenerator::new();
        let amount = Money::new(9900, "CNY").unwrap();
        Payment::new(id, subscription_id, 7, amount, PaymentMethod::Alipay, &gen, now).unwrap()
    }

    #[tokio::test]
    async fn expire_marks_payment_and_stamps_subscription() {
        let now = Utc::now();
        let created = now - Duration::hours(1);
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&payment(1, 42, created)).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(42, 7, 1, created));

        let usecase = ExpirePaymentsUseCase::new(payments.clone(), subscriptions.clone());
        let summary = usecase.execute(now).await.unwrap();
        assert_eq!(summary.expired_payments, 1);
        assert_eq!(summary.subscriptions_marked, 1);

        let p = payments.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(p.status, crate::payment::PaymentStatus::Expired);
        let s = subscriptions.find_by_id(42).await.unwrap().unwrap();
        assert!(s.payment_expired_at().is_some());
    }

    #[tokio::test]
    async fn expire_warns_but_does_not_fail_on_missing_subscription() {
        let now = Utc::now();
        let created = now - Duration::hours(1);
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&payment(1, 999, created)).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());

        let usecase = ExpirePaymentsUseCase::new(payments.clone(), subscriptions);
        let summary = usecase.execute(now).await.unwrap();
        assert_eq!(summary.expired_payments, 1);
        assert_eq!(summary.subscriptions_marked, 0);
    }

    #[tokio::test]
    async fn auto_cancel_skips_subscription_with_pending_payment() {
        let now = Utc::now();
        let created = now - Duration::hours(100);
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&payment(1, 1, created)).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(1, 7, 1, created));

        let usecase = AutoCancelUseCase::new(payments, subscriptions.clone());
        let summary = usecase.execute(now).await.unwrap();
        assert_eq!(summary.skipped_pending_payment, 1);
        assert_eq!(summary.cancelled, 0);
        let s = subscriptions.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(s.status, SubscriptionStatus::Inactive);
    }

    #[tokio::test]
    async fn auto_cancel_after_inactive_timeout_with_no_payment_ever() {
        let now = Utc::now();
        let created = now - Duration::hours(49);
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(1, 7, 1, created));

        let usecase = AutoCancelUseCase::new(payments, subscriptions.clone());
        let summary = usecase.execute(now).await.unwrap();
        assert_eq!(summary.cancelled, 1);
        let s = subscriptions.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(s.status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn auto_cancel_not_yet_due_is_left_alone() {
        let now = Utc::now();
        let created = now - Duration::hours(10);
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(1, 7, 1, created));

        let usecase = AutoCancelUseCase::new(payments, subscriptions.clone());
        let summary = usecase.execute(now).await.unwrap();
        assert_eq!(summary.cancelled, 0);
        let s = subscriptions.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(s.status, SubscriptionStatus::Inactive);
    }

    #[tokio::test]
    async fn auto_cancel_after_grace_period_past_payment_expiry() {
        let now = Utc::now();
        let created = now - Duration::hours(100);
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let mut s = Subscription::new(1, 7, 1, created);
        s.status = SubscriptionStatus::PendingPayment;
        s.set_payment_expired_at(now - Duration::hours(25));
        subscriptions.insert(s);

        let usecase = AutoCancelUseCase::new(payments, subscriptions.clone());
        let summary = usecase.execute(now).await.unwrap();
        assert_eq!(summary.cancelled, 1);
        let reloaded = subscriptions.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn auto_cancel_clears_stale_flag_when_payment_reappears() {
        let now = Utc::now();
        let created = now - Duration::hours(100);
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&payment(1, 1, now)).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let mut s = Subscription::new(1, 7, 1, created);
        s.set_payment_expired_at(now - Duration::hours(25));
        subscriptions.insert(s);

        let usecase = AutoCancelUseCase::new(payments, subscriptions.clone());
        let summary = usecase.execute(now).await.unwrap();
        assert_eq!(summary.cleared_stale_flag, 1);
        assert_eq!(summary.cancelled, 0);
        let reloaded = subscriptions.find_by_id(1).await.unwrap().unwrap();
        assert!(reloaded.payment_expired_at().is_none());
    }

    #[tokio::test]
    async fn retry_activation_clears_flag_on_success() {
        let now = Utc::now();
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let mut p = payment(1, 42, now);
        p.mark_as_paid("TX1", now).unwrap();
        p.set_activation_pending(true, now);
        payments.save(&p).await.unwrap();

        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(42, 7, 1, now));
        let activator = Arc::new(RepositorySubscriptionActivator::new(subscriptions.clone()));

        let usecase = RetryActivationUseCase::new(payments.clone(), activator);
        let summary = usecase.execute(now).await.unwrap();
        assert_eq!(summary.activated, 1);
        let reloaded = payments.find_by_id(1).await.unwrap().unwrap();
        assert!(!reloaded.is_activation_pending());
        let s = subscriptions.find_by_id(42).await.unwrap().unwrap();
        assert_eq!(s.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn retry_activation_on_missing_subscription_is_warn_logged_and_retried() {
        let now = Utc::now();
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let mut p = payment(1, 999, now);
        p.mark_as_paid("TX1", now).unwrap();
        p.set_activation_pending(true, now);
        payments.save(&p).await.unwrap();

        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let activator = Arc::new(RepositorySubscriptionActivator::new(subscriptions));

        let usecase = RetryActivationUseCase::new(payments.clone(), activator);
        let summary = usecase.execute(now).await.unwrap();
        assert_eq!(summary.still_failing, 1);
        let reloaded = payments.find_by_id(1).await.unwrap().unwrap();
        assert!(reloaded.is_activation_pending());
    }
}
