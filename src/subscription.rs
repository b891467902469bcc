//! External subscription domain model, plan/pricing lookup, and the
//! subscription activation port.
//!
//! The core only ever observes subscription *status* and a handful of
//! metadata keys; everything else about plans, pricing, and dashboards
//! lives on the other side of this boundary.

use crate::error::RepositoryError;
use crate::money::Money;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const META_PAYMENT_EXPIRED_AT: &str = "payment_expired_at";
const META_CANCELLATION_REASON: &str = "cancellation_reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Inactive,
    PendingPayment,
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    /// Statuses `CreatePayment` accepts a new payment attempt for.
    pub fn accepts_new_payment(self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Inactive | SubscriptionStatus::PendingPayment
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub id: u64,
    pub name: String,
}

/// Authoritative price for a `(plan, billing_cycle)` pair. `CreatePayment`
/// treats this, never the caller's input, as the amount to charge.
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    pub plan_id: u64,
    pub billing_cycle: BillingCycle,
    pub amount: Money,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("subscription already cancelled")]
    AlreadyCancelled,
}

/// The subscription as the billing core sees it: status plus a handful of
/// metadata keys it both reads and writes.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: u64,
    pub user_id: u64,
    pub plan_id: u64,
    pub status: SubscriptionStatus,
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(id: u64, user_id: u64, plan_id: u64, now: DateTime<Utc>) -> Self {
        Subscription {
            id,
            user_id,
            plan_id,
            status: SubscriptionStatus::Inactive,
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the subscription to `active`. A no-op, non-error, if the
    /// subscription isn't in an activatable status — callers decide what a
    /// persistence failure around this means; this method itself never
    /// errors.
    pub fn activate(&mut self, now: DateTime<Utc>) {
        if self.status.accepts_new_payment() {
            self.status = SubscriptionStatus::Active;
            self.updated_at = now;
        }
    }

    pub fn cancel(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        if self.status == SubscriptionStatus::Cancelled {
            return Err(SubscriptionError::AlreadyCancelled);
        }
        self.status = SubscriptionStatus::Cancelled;
        self.metadata.insert(
            META_CANCELLATION_REASON.to_string(),
            Value::String(reason.into()),
        );
        self.updated_at = now;
        Ok(())
    }

    pub fn set_payment_expired_at(&mut self, now: DateTime<Utc>) {
        self.metadata.insert(
            META_PAYMENT_EXPIRED_AT.to_string(),
            Value::String(now.to_rfc3339()),
        );
    }

    pub fn clear_payment_expired_at(&mut self) {
        self.metadata.remove(META_PAYMENT_EXPIRED_AT);
    }

    pub fn payment_expired_at(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get(META_PAYMENT_EXPIRED_AT)?
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Persistence contract for [`Subscription`]. Shared across use cases and
/// the reconcilers.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_id(&self, id: u64) -> Result<Option<Subscription>, RepositoryError>;

    async fn save(&self, subscription: &Subscription) -> Result<(), RepositoryError>;

    /// Batch load, used by the auto-cancel reconciler to avoid N+1.
    async fn find_by_status(
        &self,
        statuses: &[SubscriptionStatus],
    ) -> Result<Vec<Subscription>, RepositoryError>;

    /// Batch load by id, used by the expiration reconciler to avoid N+1.
    async fn find_by_ids(&self, ids: &[u64]) -> Result<Vec<Subscription>, RepositoryError>;
}

/// Plan catalog / pricing lookup, loaded by `CreatePayment`.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn find_plan(&self, plan_id: u64) -> Result<Option<Plan>, RepositoryError>;

    async fn find_pricing(
        &self,
        plan_id: u64,
        billing_cycle: BillingCycle,
    ) -> Result<Option<Pricing>, RepositoryError>;
}

/// One-way door into the subscription domain. Minimal contract: activation
/// succeeds or no-ops; it never reports "already active" as an error,
/// since the retry reconciler calls it repeatedly by design.
#[async_trait]
pub trait SubscriptionActivationPort: Send + Sync {
    async fn activate(&self, subscription_id: u64, now: DateTime<Utc>) -> Result<(), RepositoryError>;
}

/// The default [`SubscriptionActivationPort`]: load, activate in memory,
/// persist. Any repository failure is surfaced to the caller, which
/// decides whether to flag the pending state for retry.
pub struct RepositorySubscriptionActivator<R: SubscriptionRepository> {
    subscriptions: std::sync::Arc<R>,
}

impl<R: SubscriptionRepository> RepositorySubscriptionActivator<R> {
    pub fn new(subscriptions: std::sync::Arc<R>) -> Self {
        RepositorySubscriptionActivator { subscriptions }
    }
}

#[async_trait]
impl<R: SubscriptionRepository> SubscriptionActivationPort for RepositorySubscriptionActivator<R> {
    #[tracing::instrument(skip(self), fields(subscription_id))]
    async fn activate(&self, subscription_id: u64, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        let Some(mut subscription) = self.subscriptions.find_by_id(subscription_id).await? else {
            return Err(RepositoryError::NotFound(format!(
                "subscription {subscription_id}"
            )));
        };
        subscription.activate(now);
        self.subscriptions.save(&subscription).await
    }
}

/// In-memory reference implementations, used by tests and as adapters for
/// environments without a real subscription/plan database.
pub mod memory {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::RwLock;

    #[derive(Default)]
    pub struct InMemorySubscriptionRepository {
        subscriptions: RwLock<HashMap<u64, Subscription>>,
    }

    impl InMemorySubscriptionRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, subscription: Subscription) {
            self.subscriptions
                .write()
                .expect("lock poisoned")
                .insert(subscription.id, subscription);
        }
    }

    #[async_trait]
    impl SubscriptionRepository for InMemorySubscriptionRepository {
        async fn find_by_id(&self, id: u64) -> Result<Option<Subscription>, RepositoryError> {
            Ok(self
                .subscriptions
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .get(&id)
                .cloned())
        }

        async fn save(&self, subscription: &Subscription) -> Result<(), RepositoryError> {
            self.subscriptions
                .write()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .insert(subscription.id, subscription.clone());
            Ok(())
        }

        async fn find_by_status(
            &self,
            statuses: &[SubscriptionStatus],
        ) -> Result<Vec<Subscription>, RepositoryError> {
            Ok(self
                .subscriptions
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .values()
                .filter(|s| statuses.contains(&s.status))
                .cloned()
                .collect())
        }

        async fn find_by_ids(&self, ids: &[u64]) -> Result<Vec<Subscription>, RepositoryError> {
            let wanted: HashSet<u64> = ids.iter().copied().collect();
            Ok(self
                .subscriptions
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .values()
                .filter(|s| wanted.contains(&s.id))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct InMemoryPlanRepository {
        plans: RwLock<HashMap<u64, Plan>>,
        pricing: RwLock<HashMap<(u64, BillingCycle), Pricing>>,
    }

    impl InMemoryPlanRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert_plan(&self, plan: Plan) {
            self.plans.write().expect("lock poisoned").insert(plan.id, plan);
        }

        pub fn insert_pricing(&self, pricing: Pricing) {
            self.pricing
                .write()
                .expect("lock poisoned")
                .insert((pricing.plan_id, pricing.billing_cycle), pricing);
        }
    }

    #[async_trait]
    impl PlanRepository for InMemoryPlanRepository {
        async fn find_plan(&self, plan_id: u64) -> Result<Option<Plan>, RepositoryError> {
            Ok(self
                .plans
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .get(&plan_id)
                .cloned())
        }

        async fn find_pricing(
            &self,
            plan_id: u64,
            billing_cycle: BillingCycle,
        ) -> Result<Option<Pricing>, RepositoryError> {
            Ok(self
                .pricing
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .get(&(plan_id, billing_cycle))
                .cloned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activate_moves_inactive_and_pending_to_active() {
        let now = Utc::now();
        let mut s = Subscription::new(1, 1, 1, now);
        s.activate(now);
        assert_eq!(s.status, SubscriptionStatus::Active);

        let mut s2 = Subscription::new(2, 1, 1, now);
        s2.status = SubscriptionStatus::PendingPayment;
        s2.activate(now);
        assert_eq!(s2.status, SubscriptionStatus::Active);
    }

    #[test]
    fn activate_on_active_is_a_silent_no_op() {
        let now = Utc::now();
        let mut s = Subscription::new(1, 1, 1, now);
        s.status = SubscriptionStatus::Active;
        s.activate(now);
        assert_eq!(s.status, SubscriptionStatus::Active);
    }

    #[test]
    fn cancel_rejects_already_cancelled() {
        let now = Utc::now();
        let mut s = Subscription::new(1, 1, 1, now);
        s.status = SubscriptionStatus::Cancelled;
        assert_eq!(
            s.cancel("x", now),
            Err(SubscriptionError::AlreadyCancelled)
        );
    }

    #[test]
    fn payment_expired_at_round_trips_through_metadata() {
        let now = Utc::now();
        let mut s = Subscription::new(1, 1, 1, now);
        assert!(s.payment_expired_at().is_none());
        s.set_payment_expired_at(now);
        let read_back = s.payment_expired_at().unwrap();
        assert_eq!(read_back.timestamp(), now.timestamp());
        s.clear_payment_expired_at();
        assert!(s.payment_expired_at().is_none());
    }

    #[tokio::test]
    async fn repository_activator_activates_and_persists() {
        use memory::InMemorySubscriptionRepository;
        use std::sync::Arc;

        let now = Utc::now();
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        repo.insert(Subscription::new(1, 7, 1, now));
        let activator = RepositorySubscriptionActivator::new(repo.clone());
        activator.activate(1, now).await.unwrap();
        let reloaded = repo.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SubscriptionStatus::Active);
    }
}
