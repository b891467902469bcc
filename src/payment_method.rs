//! Closed-set payment method and chain enums.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of payment methods this core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Alipay,
    Wechat,
    Stripe,
    UsdtPol,
    UsdtTrc,
}

/// Error parsing a [`PaymentMethod`] or [`ChainType`] from a string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownEnumValue {
    pub kind: &'static str,
    pub value: String,
}

impl PaymentMethod {
    /// True for the two on-chain USDT methods.
    pub fn is_usdt(self) -> bool {
        matches!(self, PaymentMethod::UsdtPol | PaymentMethod::UsdtTrc)
    }

    /// The chain this method settles on, or `None` for fiat gateways.
    pub fn chain_type(self) -> Option<ChainType> {
        match self {
            PaymentMethod::UsdtPol => Some(ChainType::Pol),
            PaymentMethod::UsdtTrc => Some(ChainType::Trc),
            _ => None,
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alipay" => Ok(PaymentMethod::Alipay),
            "wechat" => Ok(PaymentMethod::Wechat),
            "stripe" => Ok(PaymentMethod::Stripe),
            "usdt_pol" => Ok(PaymentMethod::UsdtPol),
            "usdt_trc" => Ok(PaymentMethod::UsdtTrc),
            other => Err(UnknownEnumValue {
                kind: "payment method",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::Alipay => "alipay",
            PaymentMethod::Wechat => "wechat",
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::UsdtPol => "usdt_pol",
            PaymentMethod::UsdtTrc => "usdt_trc",
        };
        f.write_str(s)
    }
}

/// On-chain network carrying USDT payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    Pol,
    Trc,
}

static POL_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("valid regex"));
/// Base58 alphabet per the Tron/Bitcoin convention: excludes `0`, `O`, `I`, `l`.
static TRC_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^T[1-9A-HJ-NP-Za-km-z]{33}$").expect("valid regex"));

impl ChainType {
    /// Default confirmation-depth requirement for this chain.
    pub fn default_required_confirmations(self) -> u32 {
        match self {
            ChainType::Pol => 12,
            ChainType::Trc => 19,
        }
    }

    /// Hard upper bound any hot-reloaded confirmation requirement is clamped to.
    pub const MAX_REQUIRED_CONFIRMATIONS: u32 = 100;

    /// Validates an address's format for this chain. Does not check
    /// checksum/base58check validity beyond the alphabet and length — the
    /// explorer adapter will reject a genuinely invalid address upstream.
    pub fn is_valid_address(self, address: &str) -> bool {
        match self {
            ChainType::Pol => POL_ADDRESS_RE.is_match(address),
            ChainType::Trc => TRC_ADDRESS_RE.is_match(address),
        }
    }
}

impl FromStr for ChainType {
    type Err = UnknownEnumValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pol" => Ok(ChainType::Pol),
            "trc" => Ok(ChainType::Trc),
            other => Err(UnknownEnumValue {
                kind: "chain type",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainType::Pol => "pol",
            ChainType::Trc => "trc",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_usdt_only_for_usdt_methods() {
        assert!(PaymentMethod::UsdtPol.is_usdt());
        assert!(PaymentMethod::UsdtTrc.is_usdt());
        assert!(!PaymentMethod::Alipay.is_usdt());
        assert!(!PaymentMethod::Wechat.is_usdt());
        assert!(!PaymentMethod::Stripe.is_usdt());
    }

    #[test]
    fn chain_type_only_for_usdt_methods() {
        assert_eq!(PaymentMethod::UsdtPol.chain_type(), Some(ChainType::Pol));
        assert_eq!(PaymentMethod::UsdtTrc.chain_type(), Some(ChainType::Trc));
        assert_eq!(PaymentMethod::Stripe.chain_type(), None);
    }

    #[test]
    fn parses_known_methods_round_trip() {
        for m in [
            PaymentMethod::Alipay,
            PaymentMethod::Wechat,
            PaymentMethod::Stripe,
            PaymentMethod::UsdtPol,
            PaymentMethod::UsdtTrc,
        ] {
            assert_eq!(m.to_string().parse::<PaymentMethod>().unwrap(), m);
        }
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn default_confirmations_match_spec() {
        assert_eq!(ChainType::Pol.default_required_confirmations(), 12);
        assert_eq!(ChainType::Trc.default_required_confirmations(), 19);
    }

    #[test]
    fn validates_polygon_address_format() {
        assert!(ChainType::Pol.is_valid_address("0x1234567890123456789012345678901234567890"));
        assert!(!ChainType::Pol.is_valid_address("0x123"));
        assert!(!ChainType::Pol.is_valid_address("1234567890123456789012345678901234567890"));
    }

    #[test]
    fn validates_tron_address_format() {
        assert!(ChainType::Trc.is_valid_address("TLsV52sRDL79HXGGm9yzwKibb6BeruhUzy"));
        assert!(!ChainType::Trc.is_valid_address("0x1234567890123456789012345678901234567890"));
        assert!(!ChainType::Trc.is_valid_address("TLsV52"));
        // Base58 excludes 0, O, I, l.
        assert!(!ChainType::Trc.is_valid_address("TLsV52sRDL79HXGGm9yzwKibb6BeruhUz0"));
    }
}
