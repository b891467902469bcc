//! Use cases orchestrating the payment and subscription ports.
//!
//! Each use case owns a `Payment`/`Subscription` instance between load and
//! persist; none of them read the system clock directly — the caller
//! supplies `now`, so a whole reconciler sweep is driven by one instant end
//! to end.

pub mod confirm_usdt;
pub mod create_payment;
pub mod handle_callback;
pub mod reconcile;
