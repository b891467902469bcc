//! HandleCallback use case: verifies and applies a gateway callback,
//! driving the payment FSM and triggering subscription activation.

use crate::error::BillingError;
use crate::gateway::{CallbackStatus, InboundCallback, PaymentGateway};
use crate::notifier::{notify_best_effort, AdminNotifier};
use crate::repository::PaymentRepository;
use crate::subscription::SubscriptionActivationPort;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Gateway callbacks always receive a 2xx-equivalent acknowledgement once
/// the payment has been recorded, even on amount mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleCallbackOutcome {
    Acknowledged,
}

pub struct HandleCallbackUseCase<PayR> {
    payments: Arc<PayR>,
    gateway: Arc<dyn PaymentGateway>,
    activator: Arc<dyn SubscriptionActivationPort>,
    notifier: Option<Arc<dyn AdminNotifier>>,
}

impl<PayR> HandleCallbackUseCase<PayR>
where
    PayR: PaymentRepository + 'static,
{
    pub fn new(
        payments: Arc<PayR>,
        gateway: Arc<dyn PaymentGateway>,
        activator: Arc<dyn SubscriptionActivationPort>,
        notifier: Option<Arc<dyn AdminNotifier>>,
    ) -> Self {
        HandleCallbackUseCase {
            payments,
            gateway,
            activator,
            notifier,
        }
    }

    #[tracing::instrument(skip(self, inbound))]
    pub async fn execute(
        &self,
        inbound: InboundCallback,
        now: DateTime<Utc>,
    ) -> Result<HandleCallbackOutcome, BillingError> {
        let callback = self.gateway.verify_callback(&inbound).await?;

        let mut payment = self
            .payments
            .find_by_gateway_order_no(&callback.gateway_order_no)
            .await?
            .ok_or_else(|| {
                BillingError::not_found(format!(
                    "payment for gateway_order_no {}",
                    callback.gateway_order_no
                ))
            })?;

        if payment.status == crate::payment::PaymentStatus::Paid {
            tracing::info!(payment_id = payment.id, "callback replay on already-paid payment");
            return Ok(HandleCallbackOutcome::Acknowledged);
        }

        match callback.status {
            CallbackStatus::Success => {
                self.handle_success(&mut payment, &callback, now).await?;
            }
            CallbackStatus::Failure(ref reason) => {
                let _ = payment.mark_as_failed(reason.clone(), now);
                self.payments.save(&payment).await?;
            }
        }

        let notifier = self.notifier.clone();
        let message = format!(
            "payment {} callback processed: status={:?}",
            payment.order_no, payment.status
        );
        tokio::spawn(async move {
            notify_best_effort(notifier.as_deref(), &message).await;
        });

        Ok(HandleCallbackOutcome::Acknowledged)
    }

    async fn handle_success(
        &self,
        payment: &mut crate::payment::Payment,
        callback: &crate::gateway::CallbackData,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        if let Err(detail) =
            payment.validate_callback_amount(callback.amount_smallest_unit, &callback.currency)
        {
            let _ = payment.mark_as_failed(format!("amount/currency mismatch: {detail}"), now);
            self.payments.save(payment).await?;
            return Ok(());
        }

        payment.set_activation_pending(true, now);
        payment
            .mark_as_paid(callback.transaction_id.clone(), now)
            .map_err(BillingError::from)?;
        self.payments.save(payment).await?;

        match self.activator.activate(payment.subscription_id, now).await {
            Ok(()) => {
                payment.set_activation_pending(false, now);
                payment.set_activation_error(None, now);
                // A failure here must propagate so the gateway retries the
                // callback and the flag is eventually cleared.
                self.payments.save(payment).await?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "subscription activation failed; will retry");
                payment.set_activation_error(Some(e.to_string()), now);
                self.payments.save(payment).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CallbackData, CreatePaymentRequest, GatewayPaymentInfo};
    use crate::money::Money;
    use crate::payment::{Payment, PaymentStatus, SequentialOrderNoGenerator};
    use crate::payment_method::PaymentMethod;
    use crate::repository::memory::InMemoryPaymentRepository;
    use crate::subscription::memory::InMemorySubscriptionRepository;
    use crate::subscription::{RepositorySubscriptionActivator, Subscription};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct StubGateway {
        response: Mutex<Option<CallbackData>>,
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_payment(
            &self,
            _req: &CreatePaymentRequest,
        ) -> Result<GatewayPaymentInfo, BillingError> {
            unimplemented!()
        }

        async fn verify_callback(
            &self,
            _inbound: &InboundCallback,
        ) -> Result<CallbackData, BillingError> {
            Ok(self.response.lock().unwrap().clone().unwrap())
        }
    }

    fn make_payment(now: DateTime<Utc>) -> Payment {
        let gen = SequentialOrderNoGenerator::new();
        let amount = Money::new(9900, "CNY").unwrap();
        let mut p = Payment::new(1, 42, 7, amount, PaymentMethod::Alipay, &gen, now).unwrap();
        p.set_gateway_info("GW1", "https://pay.example", None, now);
        p
    }

    fn callback(amount: i64, currency: &str, status: CallbackStatus) -> CallbackData {
        CallbackData {
            gateway_order_no: "GW1".into(),
            transaction_id: "TX1".into(),
            amount_smallest_unit: amount,
            currency: currency.into(),
            status,
            paid_at: None,
            raw: serde_json::Value::Object(Default::default()),
        }
    }

    async fn setup(
        cb: CallbackData,
    ) -> (
        HandleCallbackUseCase<InMemoryPaymentRepository>,
        Arc<InMemoryPaymentRepository>,
        Arc<InMemorySubscriptionRepository>,
    ) {
        let now = Utc::now();
        let payments = Arc::new(InMemoryPaymentRepository::new());
        payments.save(&make_payment(now)).await.unwrap();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(42, 7, 1, now));
        let activator = Arc::new(RepositorySubscriptionActivator::new(subscriptions.clone()));
        let gateway = Arc::new(StubGateway {
            response: Mutex::new(Some(cb)),
        });
        let usecase = HandleCallbackUseCase::new(payments.clone(), gateway, activator, None);
        (usecase, payments, subscriptions)
    }

    #[tokio::test]
    async fn s1_fiat_happy_path_activates_subscription() {
        let (usecase, payments, subscriptions) =
            setup(callback(9900, "CNY", CallbackStatus::Success)).await;
        let outcome = usecase
            .execute(InboundCallback {
                headers: BTreeMap::new(),
                body: vec![],
            }, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, HandleCallbackOutcome::Acknowledged);
        let p = payments.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Paid);
        assert_eq!(p.transaction_id.as_deref(), Some("TX1"));
        let s = subscriptions.find_by_id(42).await.unwrap().unwrap();
        assert_eq!(s.status, crate::subscription::SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn s2_amount_tampering_fails_payment_but_acknowledges() {
        let (usecase, payments, subscriptions) =
            setup(callback(9901, "CNY", CallbackStatus::Success)).await;
        let outcome = usecase
            .execute(InboundCallback {
                headers: BTreeMap::new(),
                body: vec![],
            }, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, HandleCallbackOutcome::Acknowledged);
        let p = payments.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Failed);
        let reason = p
            .metadata
            .get(crate::payment::META_FAILURE_REASON)
            .and_then(|v| v.as_str())
            .unwrap();
        assert!(reason.contains("amount mismatch"));
        let s = subscriptions.find_by_id(42).await.unwrap().unwrap();
        assert_eq!(s.status, crate::subscription::SubscriptionStatus::Inactive);
    }

    #[tokio::test]
    async fn replaying_success_callback_twice_is_idempotent() {
        let (usecase, payments, _subs) = setup(callback(9900, "CNY", CallbackStatus::Success)).await;
        usecase
            .execute(InboundCallback {
                headers: BTreeMap::new(),
                body: vec![],
            }, Utc::now())
            .await
            .unwrap();
        let after_first = payments.find_by_id(1).await.unwrap().unwrap();
        usecase
            .execute(InboundCallback {
                headers: BTreeMap::new(),
                body: vec![],
            }, Utc::now())
            .await
            .unwrap();
        let after_second = payments.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(after_first.version, after_second.version);
        assert_eq!(after_first.transaction_id, after_second.transaction_id);
    }

    #[tokio::test]
    async fn failure_status_marks_payment_failed_and_still_acknowledges() {
        let (usecase, payments, _subs) =
            setup(callback(9900, "CNY", CallbackStatus::Failure("TRADE_CLOSED".into()))).await;
        let outcome = usecase
            .execute(InboundCallback {
                headers: BTreeMap::new(),
                body: vec![],
            }, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, HandleCallbackOutcome::Acknowledged);
        let p = payments.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(p.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn unknown_gateway_order_no_surfaces_not_found() {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        let activator = Arc::new(RepositorySubscriptionActivator::new(subscriptions));
        let gateway = Arc::new(StubGateway {
            response: Mutex::new(Some(callback(9900, "CNY", CallbackStatus::Success))),
        });
        let usecase = HandleCallbackUseCase::new(payments, gateway, activator, None);
        let err = usecase
            .execute(InboundCallback {
                headers: BTreeMap::new(),
                body: vec![],
            }, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::NotFound(_)));
    }
}
