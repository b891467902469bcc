//! Hot-reloadable configuration.
//!
//! The `LiteralOrEnv` literal-or-env wrapper resolves secrets at
//! deserialize time; `serde::Deserialize` impls use defaulted fields
//! throughout; [`HotReloadable`] generalizes a single atomic pointer swap
//! under a reader-preferring `RwLock` rather than repeating it ad hoc per
//! config struct.

use crate::payment_method::ChainType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A transparent wrapper that resolves environment variables during
/// deserialization. Supports literal values and `$VAR` / `${VAR}` syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    fn parse_env_var_syntax(s: &str) -> Option<String> {
        if let Some(stripped) = s.strip_prefix("${") {
            stripped.strip_suffix('}').map(str::to_string)
        } else if let Some(var_name) = s.strip_prefix('$') {
            if !var_name.is_empty() && var_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                Some(var_name.to_string())
            } else {
                None
            }
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = if let Some(var_name) = Self::parse_env_var_syntax(&s) {
            std::env::var(&var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "environment variable '{var_name}' not found (referenced as '{s}')"
                ))
            })?
        } else {
            s
        };
        value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("failed to parse value: {e}")))
            .map(LiteralOrEnv)
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// A config value that can be hot-reloaded via a single atomic pointer
/// swap. Readers snapshot an `Arc` under the read lock for the minimum
/// time needed; writers replace the whole value, never mutate in place.
pub struct HotReloadable<T> {
    current: RwLock<Arc<T>>,
}

impl<T> HotReloadable<T> {
    pub fn new(initial: T) -> Self {
        HotReloadable {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn load(&self) -> Arc<T> {
        self.current.read().expect("config lock poisoned").clone()
    }

    pub fn store(&self, value: T) {
        let mut guard = self.current.write().expect("config lock poisoned");
        *guard = Arc::new(value);
    }
}

/// Per-chain confirmation-depth requirements, clamped to `[1, 100]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmationRequirements {
    #[serde(default)]
    overrides: HashMap<ChainType, u32>,
}

impl ConfirmationRequirements {
    pub fn new(overrides: HashMap<ChainType, u32>) -> Self {
        ConfirmationRequirements { overrides }
    }

    /// The effective requirement for `chain`: the configured override if
    /// present, else the chain's default, always clamped to `[1, 100]`.
    pub fn required_confirmations(&self, chain: ChainType) -> u32 {
        let raw = self
            .overrides
            .get(&chain)
            .copied()
            .unwrap_or_else(|| chain.default_required_confirmations());
        raw.clamp(1, ChainType::MAX_REQUIRED_CONFIRMATIONS)
    }
}

impl Default for ConfirmationRequirements {
    fn default() -> Self {
        ConfirmationRequirements {
            overrides: HashMap::new(),
        }
    }
}

/// Confirmation-worker hot-reloadable scalars.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmWorkerConfig {
    #[serde(default)]
    pub confirmation_requirements: ConfirmationRequirements,
    /// Inter-request delay between payments in one worker sweep, to
    /// respect explorer rate limits. Defaults to 10s.
    #[serde(default = "config_defaults::default_inter_request_delay_secs")]
    pub inter_request_delay_secs: u64,
}

impl ConfirmWorkerConfig {
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_secs(self.inter_request_delay_secs)
    }
}

impl Default for ConfirmWorkerConfig {
    fn default() -> Self {
        ConfirmWorkerConfig {
            confirmation_requirements: ConfirmationRequirements::default(),
            inter_request_delay_secs: config_defaults::default_inter_request_delay_secs(),
        }
    }
}

/// Top-level billing-core configuration: the hot-reloadable scalars plus
/// the fixed windows used by the reconcilers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingConfig {
    #[serde(default = "config_defaults::default_payment_ttl_minutes")]
    pub payment_ttl_minutes: i64,
    #[serde(default = "config_defaults::default_reservation_ttl_minutes")]
    pub reservation_ttl_minutes: i64,
    #[serde(default = "config_defaults::default_grace_period_hours")]
    pub grace_period_hours: i64,
    #[serde(default = "config_defaults::default_inactive_timeout_hours")]
    pub inactive_timeout_hours: i64,
    #[serde(default = "config_defaults::default_confirmation_expiry_grace_hours")]
    pub confirmation_expiry_grace_hours: i64,
    #[serde(default)]
    pub confirm_worker: ConfirmWorkerConfig,
    /// Polygon explorer API key, `$VAR`-resolvable.
    #[serde(default)]
    pub polygon_explorer_api_key: Option<LiteralOrEnv<String>>,
    /// Tron explorer API key, `$VAR`-resolvable.
    #[serde(default)]
    pub tron_explorer_api_key: Option<LiteralOrEnv<String>>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        BillingConfig {
            payment_ttl_minutes: config_defaults::default_payment_ttl_minutes(),
            reservation_ttl_minutes: config_defaults::default_reservation_ttl_minutes(),
            grace_period_hours: config_defaults::default_grace_period_hours(),
            inactive_timeout_hours: config_defaults::default_inactive_timeout_hours(),
            confirmation_expiry_grace_hours: config_defaults::default_confirmation_expiry_grace_hours(),
            confirm_worker: ConfirmWorkerConfig::default(),
            polygon_explorer_api_key: None,
            tron_explorer_api_key: None,
        }
    }
}

mod config_defaults {
    pub fn default_payment_ttl_minutes() -> i64 {
        30
    }

    pub fn default_reservation_ttl_minutes() -> i64 {
        10
    }

    pub fn default_grace_period_hours() -> i64 {
        24
    }

    pub fn default_inactive_timeout_hours() -> i64 {
        48
    }

    pub fn default_confirmation_expiry_grace_hours() -> i64 {
        1
    }

    pub fn default_inter_request_delay_secs() -> u64 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_requirements_fall_back_to_chain_default() {
        let reqs = ConfirmationRequirements::default();
        assert_eq!(reqs.required_confirmations(ChainType::Pol), 12);
        assert_eq!(reqs.required_confirmations(ChainType::Trc), 19);
    }

    #[test]
    fn confirmation_requirements_clamp_to_max() {
        let mut overrides = HashMap::new();
        overrides.insert(ChainType::Pol, 1_000);
        let reqs = ConfirmationRequirements::new(overrides);
        assert_eq!(reqs.required_confirmations(ChainType::Pol), 100);
    }

    #[test]
    fn confirmation_requirements_clamp_to_min() {
        let mut overrides = HashMap::new();
        overrides.insert(ChainType::Trc, 0);
        let reqs = ConfirmationRequirements::new(overrides);
        assert_eq!(reqs.required_confirmations(ChainType::Trc), 1);
    }

    #[test]
    fn hot_reloadable_store_swaps_the_whole_snapshot() {
        let hot = HotReloadable::new(ConfirmWorkerConfig::default());
        assert_eq!(hot.load().inter_request_delay_secs, 10);
        hot.store(ConfirmWorkerConfig {
            confirmation_requirements: ConfirmationRequirements::default(),
            inter_request_delay_secs: 5,
        });
        assert_eq!(hot.load().inter_request_delay_secs, 5);
    }

    #[test]
    fn literal_or_env_resolves_env_var_syntax() {
        std::env::set_var("BILLING_CORE_TEST_VAR", "resolved-value");
        let parsed: LiteralOrEnv<String> =
            serde_json::from_str("\"${BILLING_CORE_TEST_VAR}\"").unwrap();
        assert_eq!(parsed.into_inner(), "resolved-value");
        std::env::remove_var("BILLING_CORE_TEST_VAR");
    }

    #[test]
    fn literal_or_env_passes_through_literal_values() {
        let parsed: LiteralOrEnv<String> = serde_json::from_str("\"a-literal-key\"").unwrap();
        assert_eq!(parsed.into_inner(), "a-literal-key");
    }
}
