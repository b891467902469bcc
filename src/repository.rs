//! Payment persistence port.
//!
//! Queries are scoped to exactly what the use cases in `usecases/` need;
//! batch queries exist to avoid N+1 access patterns (expiration sweep,
//! auto-cancel probing).

use crate::error::RepositoryError;
use crate::payment::{Payment, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Persistence contract for [`Payment`] aggregates.
///
/// Implementations must be safe for concurrent use — repositories are
/// process-global, shared across worker ticks and concurrent callback
/// handlers.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts or updates a payment, keyed by `id`.
    async fn save(&self, payment: &Payment) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: u64) -> Result<Option<Payment>, RepositoryError>;

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<Payment>, RepositoryError>;

    async fn find_by_gateway_order_no(
        &self,
        gateway_order_no: &str,
    ) -> Result<Option<Payment>, RepositoryError>;

    /// Returns the non-final payment for a subscription, if any. Used by
    /// `CreatePayment` to reject a second concurrent payment attempt.
    async fn find_pending_by_subscription_id(
        &self,
        subscription_id: u64,
    ) -> Result<Option<Payment>, RepositoryError>;

    /// Returns which of the given subscriptions currently have a non-final
    /// payment, in a single query (used by the auto-cancel reconciler to
    /// avoid N+1).
    async fn find_subscriptions_with_non_final_payment(
        &self,
        subscription_ids: &[u64],
    ) -> Result<HashSet<u64>, RepositoryError>;

    /// All payments whose `expired_at < now` and `status == pending`.
    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Payment>, RepositoryError>;

    /// All pending payments paid via a USDT method (`is_usdt`), for the
    /// confirmation worker.
    async fn find_pending_usdt(&self) -> Result<Vec<Payment>, RepositoryError>;

    /// All paid payments (fiat and USDT) with `subscription_activation_pending`
    /// set, for the activation-retry reconciler.
    async fn find_paid_with_activation_pending(&self) -> Result<Vec<Payment>, RepositoryError>;
}

/// An in-memory [`PaymentRepository`], used by tests and as a reference
/// implementation for the storage-engine-agnostic contract above.
pub mod memory {
    use super::*;
    use std::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryPaymentRepository {
        payments: RwLock<std::collections::BTreeMap<u64, Payment>>,
    }

    impl InMemoryPaymentRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PaymentRepository for InMemoryPaymentRepository {
        async fn save(&self, payment: &Payment) -> Result<(), RepositoryError> {
            self.payments
                .write()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .insert(payment.id, payment.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: u64) -> Result<Option<Payment>, RepositoryError> {
            Ok(self
                .payments
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .get(&id)
                .cloned())
        }

        async fn find_by_order_no(
            &self,
            order_no: &str,
        ) -> Result<Option<Payment>, RepositoryError> {
            Ok(self
                .payments
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .values()
                .find(|p| p.order_no == order_no)
                .cloned())
        }

        async fn find_by_gateway_order_no(
            &self,
            gateway_order_no: &str,
        ) -> Result<Option<Payment>, RepositoryError> {
            Ok(self
                .payments
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .values()
                .find(|p| p.gateway_order_no.as_deref() == Some(gateway_order_no))
                .cloned())
        }

        async fn find_pending_by_subscription_id(
            &self,
            subscription_id: u64,
        ) -> Result<Option<Payment>, RepositoryError> {
            Ok(self
                .payments
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .values()
                .find(|p| p.subscription_id == subscription_id && !p.status.is_final())
                .cloned())
        }

        async fn find_subscriptions_with_non_final_payment(
            &self,
            subscription_ids: &[u64],
        ) -> Result<HashSet<u64>, RepositoryError> {
            let guard = self
                .payments
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?;
            let wanted: HashSet<u64> = subscription_ids.iter().copied().collect();
            Ok(guard
                .values()
                .filter(|p| wanted.contains(&p.subscription_id) && !p.status.is_final())
                .map(|p| p.subscription_id)
                .collect())
        }

        async fn find_expired_pending(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<Payment>, RepositoryError> {
            Ok(self
                .payments
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .values()
                .filter(|p| p.status == PaymentStatus::Pending && p.expired_at < now)
                .cloned()
                .collect())
        }

        async fn find_pending_usdt(&self) -> Result<Vec<Payment>, RepositoryError> {
            Ok(self
                .payments
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .values()
                .filter(|p| p.status == PaymentStatus::Pending && p.payment_method.is_usdt())
                .cloned()
                .collect())
        }

        async fn find_paid_with_activation_pending(&self) -> Result<Vec<Payment>, RepositoryError> {
            Ok(self
                .payments
                .read()
                .map_err(|_| RepositoryError::Backend("lock poisoned".into()))?
                .values()
                .filter(|p| p.status == PaymentStatus::Paid && p.is_activation_pending())
                .cloned()
                .collect())
        }
    }
}
