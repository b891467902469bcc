//! This module provides various helper types used throughout the x402-facilitator-local crate:
//!
//! - [`sig_down`] - Graceful shutdown signal handling
//! - [`telemetry`] - OpenTelemetry tracing setup

pub mod sig_down;
pub mod telemetry;

pub use sig_down::*;
pub use telemetry::*;
