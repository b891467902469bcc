#[cfg(feature = "facilitator")]
pub mod config;
#[cfg(feature = "facilitator")]
pub use config::*;

#[cfg(feature = "facilitator")]
pub mod provider;
#[cfg(feature = "facilitator")]
pub use provider::*;

pub mod types;
pub use types::*;
