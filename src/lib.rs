//! A SaaS billing backend's payment/subscription-activation core.
//!
//! This crate implements the payment lifecycle, a USDT suffix allocator
//! for disambiguating on-chain transfers that share an address, a bespoke
//! USDT gateway and a fiat gateway port, a blockchain transaction monitor,
//! and the use cases that tie them together: creating a payment, handling
//! a gateway callback, a serialized USDT confirmation poller, and the
//! reconcilers that expire stale payments, auto-cancel unpaid
//! subscriptions, and retry subscription activation.
//!
//! HTTP transport, routing, and authentication are out of scope — this
//! crate is a library of ports and use cases for a caller to wire into
//! whatever server framework it already runs.
//!
//! # Modules
//!
//! - [`money`] / [`payment_method`] — the closed-set value types.
//! - [`payment`] — the payment aggregate and its four-state FSM.
//! - [`repository`] — the payment persistence port.
//! - [`exchange_rate`] — CNY→USDT conversion port.
//! - [`suffix_allocator`] — atomic USDT address-suffix reservation.
//! - [`gateway`] — fiat gateway port + the bespoke USDT gateway.
//! - [`monitor`] — blockchain transaction monitor port + composite adapter.
//! - [`subscription`] — the external subscription/plan model and the
//!   subscription-activation port.
//! - [`notifier`] — the optional best-effort admin notifier.
//! - [`usecases`] — `CreatePayment`, `HandleCallback`, the USDT confirmation
//!   worker, and the expiration/auto-cancel/retry-activation reconcilers.
//! - [`config`] — hot-reloadable configuration.
//! - [`clock`] — the injectable clock port.
//! - [`error`] — the shared error taxonomy.
//! - [`telemetry`] — opt-in `tracing-subscriber` bootstrap.

pub mod clock;
pub mod config;
pub mod error;
pub mod exchange_rate;
pub mod gateway;
pub mod money;
pub mod monitor;
pub mod notifier;
pub mod payment;
pub mod payment_method;
pub mod repository;
pub mod subscription;
pub mod suffix_allocator;
pub mod telemetry;
pub mod usecases;
