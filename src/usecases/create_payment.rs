//! CreatePayment use case: validates a subscription against its plan,
//! allocates a payment, and branches into a fiat or USDT gateway.

use crate::error::BillingError;
use crate::gateway::{CreatePaymentRequest as GatewayCreatePaymentRequest, PaymentGateway, UsdtGateway};
use crate::money::Money;
use crate::payment::{OrderNoGenerator, Payment, PaymentIdAllocator};
use crate::payment_method::PaymentMethod;
use crate::repository::PaymentRepository;
use crate::subscription::{BillingCycle, PlanRepository, SubscriptionRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Caller-supplied request. `return_url` is only meaningful to fiat
/// gateways that redirect after checkout.
#[derive(Debug, Clone)]
pub struct CreatePaymentInput {
    pub subscription_id: u64,
    pub user_id: u64,
    pub billing_cycle: BillingCycle,
    pub payment_method: String,
    pub return_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentOutput {
    pub payment: Payment,
    pub payment_url: Option<String>,
    pub qr_code: Option<String>,
}

pub struct CreatePaymentUseCase<SR, PR, PayR> {
    subscriptions: Arc<SR>,
    plans: Arc<PR>,
    payments: Arc<PayR>,
    gateway: Arc<dyn PaymentGateway>,
    usdt_gateway: Arc<UsdtGateway>,
    order_no_gen: Arc<dyn OrderNoGenerator>,
    id_alloc: Arc<dyn PaymentIdAllocator>,
}

impl<SR, PR, PayR> CreatePaymentUseCase<SR, PR, PayR>
where
    SR: SubscriptionRepository,
    PR: PlanRepository,
    PayR: PaymentRepository,
{
    pub fn new(
        subscriptions: Arc<SR>,
        plans: Arc<PR>,
        payments: Arc<PayR>,
        gateway: Arc<dyn PaymentGateway>,
        usdt_gateway: Arc<UsdtGateway>,
        order_no_gen: Arc<dyn OrderNoGenerator>,
        id_alloc: Arc<dyn PaymentIdAllocator>,
    ) -> Self {
        CreatePaymentUseCase {
            subscriptions,
            plans,
            payments,
            gateway,
            usdt_gateway,
            order_no_gen,
            id_alloc,
        }
    }

    #[tracing::instrument(skip(self, input), fields(subscription_id = input.subscription_id, user_id = input.user_id))]
    pub async fn execute(
        &self,
        input: CreatePaymentInput,
        now: DateTime<Utc>,
    ) -> Result<CreatePaymentOutput, BillingError> {
        let subscription = self
            .subscriptions
            .find_by_id(input.subscription_id)
            .await?
            .ok_or_else(|| BillingError::not_found(format!("subscription {}", input.subscription_id)))?;

        if subscription.user_id != input.user_id {
            return Err(BillingError::Permission);
        }

        if !subscription.status.accepts_new_payment() {
            return Err(BillingError::conflict(format!(
                "subscription {} is not payable in status {:?}",
                subscription.id, subscription.status
            )));
        }

        let plan = self
            .plans
            .find_plan(subscription.plan_id)
            .await?
            .ok_or_else(|| BillingError::not_found(format!("plan {}", subscription.plan_id)))?;

        let pricing = self
            .plans
            .find_pricing(plan.id, input.billing_cycle)
            .await?
            .ok_or_else(|| {
                BillingError::not_found(format!(
                    "pricing for plan {} / {:?}",
                    plan.id, input.billing_cycle
                ))
            })?;

        if self
            .payments
            .find_pending_by_subscription_id(subscription.id)
            .await?
            .is_some()
        {
            return Err(BillingError::conflict(format!(
                "subscription {} already has a pending payment",
                subscription.id
            )));
        }

        let payment_method: PaymentMethod = input
            .payment_method
            .parse()
            .map_err(|e: crate::payment_method::UnknownEnumValue| BillingError::validation(e.to_string()))?;

        let amount = pricing.amount;

        let payment_id = self.id_alloc.next_payment_id();
        let mut payment = Payment::new(
            payment_id,
            subscription.id,
            input.user_id,
            amount,
            payment_method,
            self.order_no_gen.as_ref(),
            now,
        )?;

        if payment_method.is_usdt() {
            let usdt_info = self
                .usdt_gateway
                .create_usdt_payment(payment.id, amount.amount_smallest_unit(), payment_method, now)
                .await?;
            payment.set_usdt_info(
                usdt_info.chain,
                usdt_info.amount_raw,
                usdt_info.receiving_address.clone(),
                usdt_info.exchange_rate,
                now,
            );
            if let Err(e) = self.payments.save(&payment).await {
                self.usdt_gateway.release_suffix(&usdt_info).await;
                return Err(e.into());
            }
            Ok(CreatePaymentOutput {
                payment,
                payment_url: None,
                qr_code: None,
            })
        } else {
            let gateway_info = self
                .gateway
                .create_payment(&GatewayCreatePaymentRequest {
                    order_no: payment.order_no.clone(),
                    amount,
                    subject: format!("subscription {} renewal", subscription.id),
                    return_url: input.return_url.clone(),
                })
                .await?;
            payment.set_gateway_info(
                gateway_info.gateway_order_no.clone(),
                gateway_info.payment_url.clone().unwrap_or_default(),
                gateway_info.qr_code.clone(),
                now,
            );
            self.payments.save(&payment).await?;
            Ok(CreatePaymentOutput {
                payment_url: gateway_info.payment_url,
                qr_code: gateway_info.qr_code,
                payment,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange_rate::FixedExchangeRateService;
    use crate::gateway::{CallbackData, InboundCallback, UsdtGatewayConfig};
    use crate::payment::SequentialOrderNoGenerator;
    use crate::repository::memory::InMemoryPaymentRepository;
    use crate::subscription::{
        memory::{InMemoryPlanRepository, InMemorySubscriptionRepository},
        Plan, Pricing, Subscription, SubscriptionStatus,
    };
    use crate::suffix_allocator::InMemorySuffixAllocator;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StubGateway;

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_payment(
            &self,
            req: &GatewayCreatePaymentRequest,
        ) -> Result<crate::gateway::GatewayPaymentInfo, BillingError> {
            Ok(crate::gateway::GatewayPaymentInfo {
                gateway_order_no: format!("GW-{}", req.order_no),
                payment_url: Some("https://pay.example/checkout".into()),
                qr_code: None,
            })
        }

        async fn verify_callback(
            &self,
            _inbound: &InboundCallback,
        ) -> Result<CallbackData, BillingError> {
            unimplemented!("not exercised in create_payment tests")
        }
    }

    fn usdt_gateway() -> Arc<UsdtGateway> {
        let mut pool = HashMap::new();
        pool.insert(
            crate::payment_method::ChainType::Pol,
            vec!["0x1234567890123456789012345678901234567890".to_string()],
        );
        Arc::new(UsdtGateway::new(
            Arc::new(FixedExchangeRateService::new(1000, 1)),
            Arc::new(InMemorySuffixAllocator::new()),
            UsdtGatewayConfig::new(pool, chrono::Duration::minutes(10)),
        ))
    }

    fn setup() -> (
        CreatePaymentUseCase<InMemorySubscriptionRepository, InMemoryPlanRepository, InMemoryPaymentRepository>,
        Arc<InMemorySubscriptionRepository>,
        Arc<InMemoryPlanRepository>,
    ) {
        let now = Utc::now();
        let subscriptions = Arc::new(InMemorySubscriptionRepository::new());
        subscriptions.insert(Subscription::new(42, 7, 1, now));
        let plans = Arc::new(InMemoryPlanRepository::new());
        plans.insert_plan(Plan {
            id: 1,
            name: "pro".into(),
        });
        plans.insert_pricing(Pricing {
            plan_id: 1,
            billing_cycle: BillingCycle::Monthly,
            amount: Money::new(9900, "CNY").unwrap(),
        });
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let usecase = CreatePaymentUseCase::new(
            subscriptions.clone(),
            plans.clone(),
            payments,
            Arc::new(StubGateway),
            usdt_gateway(),
            Arc::new(SequentialOrderNoGenerator::new()),
            Arc::new(crate::payment::AtomicPaymentIdAllocator::new()),
        );
        (usecase, subscriptions, plans)
    }

    #[tokio::test]
    async fn creates_fiat_payment_happy_path() {
        let (usecase, _subs, _plans) = setup();
        let out = usecase
            .execute(
                CreatePaymentInput {
                    subscription_id: 42,
                    user_id: 7,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method: "alipay".into(),
                    return_url: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(out.payment.subscription_id, 42);
        assert!(out.payment.gateway_order_no.is_some());
        assert!(out.payment_url.is_some());
    }

    #[tokio::test]
    async fn creates_usdt_payment_happy_path() {
        let (usecase, _subs, _plans) = setup();
        let out = usecase
            .execute(
                CreatePaymentInput {
                    subscription_id: 42,
                    user_id: 7,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method: "usdt_pol".into(),
                    return_url: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(out.payment.receiving_address.is_some());
        assert!(out.payment.usdt_amount_raw.is_some());
    }

    #[tokio::test]
    async fn rejects_wrong_user() {
        let (usecase, _subs, _plans) = setup();
        let err = usecase
            .execute(
                CreatePaymentInput {
                    subscription_id: 42,
                    user_id: 999,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method: "alipay".into(),
                    return_url: None,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Permission));
    }

    #[tokio::test]
    async fn rejects_subscription_not_found() {
        let (usecase, _subs, _plans) = setup();
        let err = usecase
            .execute(
                CreatePaymentInput {
                    subscription_id: 999,
                    user_id: 7,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method: "alipay".into(),
                    return_url: None,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_subscription_already_active() {
        let (usecase, subs, _plans) = setup();
        let now = Utc::now();
        let mut s = subs.find_by_id(42).await.unwrap().unwrap();
        s.status = SubscriptionStatus::Active;
        subs.save(&s).await.unwrap();
        let err = usecase
            .execute(
                CreatePaymentInput {
                    subscription_id: 42,
                    user_id: 7,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method: "alipay".into(),
                    return_url: None,
                },
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Conflict(_)));
    }

    #[tokio::test]
    async fn rejects_second_pending_payment_for_same_subscription() {
        let (usecase, _subs, _plans) = setup();
        usecase
            .execute(
                CreatePaymentInput {
                    subscription_id: 42,
                    user_id: 7,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method: "alipay".into(),
                    return_url: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let err = usecase
            .execute(
                CreatePaymentInput {
                    subscription_id: 42,
                    user_id: 7,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method: "alipay".into(),
                    return_url: None,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Conflict(_)));
    }

    #[tokio::test]
    async fn rejects_missing_plan() {
        let (usecase, subs, _plans) = setup();
        let now = Utc::now();
        let mut s = subs.find_by_id(42).await.unwrap().unwrap();
        s.plan_id = 999;
        subs.save(&s).await.unwrap();
        let err = usecase
            .execute(
                CreatePaymentInput {
                    subscription_id: 42,
                    user_id: 7,
                    billing_cycle: BillingCycle::Monthly,
                    payment_method: "alipay".into(),
                    return_url: None,
                },
                now,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_missing_pricing() {
        let (usecase, _subs, _plans) = setup();
        // No Yearly pricing was registered.
        let err = usecase
            .execute(
                CreatePaymentInput {
                    subscription_id: 42,
                    user_id: 7,
                    billing_cycle: BillingCycle::Yearly,
                    payment_method: "alipay".into(),
                    return_url: None,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::NotFound(_)));
    }
}
