//! Error taxonomy for the billing core.
//!
//! One `thiserror` enum per boundary, narrow variants with `#[from]`
//! conversions wired up at the point where a lower-level error crosses
//! into a use case.

use crate::payment::PaymentStatus;
use std::fmt;

/// Top-level error returned by every use case.
///
/// Variant names track error kind, not implementation detail: callers
/// match on kind, not on which port produced the error.
#[derive(thiserror::Error, Debug)]
pub enum BillingError {
    /// Bad argument, invalid address, invalid status, invalid currency,
    /// non-positive amount, unknown enum value.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Subscription, plan, pricing, or payment not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A pending payment already exists, or no suffix is available.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller does not own the resource it is acting on.
    #[error("permission denied")]
    Permission,

    /// An illegal payment FSM transition was attempted. Never mutates.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A collaborator outside our control failed: gateway signature,
    /// explorer transport/rate-limit, exchange-rate fetch.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The repository failed to persist or load state.
    #[error(transparent)]
    Persistence(#[from] RepositoryError),

    /// Defaults that should be unreachable, or misconfiguration.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BillingError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        BillingError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        BillingError::Conflict(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        BillingError::Upstream(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        BillingError::Internal(msg.into())
    }
}

/// An illegal attempt to move a [`Payment`](crate::payment::Payment) along
/// an edge the FSM does not permit.
///
/// Renders as `"cannot <verb> payment with status <s>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub verb: &'static str,
    pub from: PaymentStatus,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot {} payment with status {}",
            self.verb, self.from
        )
    }
}

impl std::error::Error for TransitionError {}

/// Errors surfaced by a [`PaymentRepository`](crate::repository::PaymentRepository)
/// or the subscription/plan repositories it shares a store with.
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}
