//! Integer-cent money.
//!
//! All arithmetic that matters (comparisons, transitions) operates on the
//! signed smallest-unit integer. Floating point never appears here; it is
//! confined to presentation and the advisory exchange-rate record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default fiat currency for this billing backend when none is given.
pub const DEFAULT_CURRENCY: &str = "CNY";

/// An amount expressed in the smallest unit of its currency (CNY cents,
/// or USDT's 10⁻⁶ unit), plus the 3-letter currency code it's denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount_smallest_unit: i64,
    currency: [u8; 3],
}

/// Errors constructing a [`Money`] value.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be positive, got {0}")]
    NonPositive(i64),
    #[error("currency code must be exactly 3 ASCII letters, got {0:?}")]
    InvalidCurrency(String),
}

impl Money {
    /// Constructs a `Money`, requiring `amount_smallest_unit > 0`. Use
    /// [`Money::zero`] when a non-positive placeholder is legitimately
    /// needed (e.g. a warn-logged fallback rate).
    pub fn new(amount_smallest_unit: i64, currency: &str) -> Result<Self, MoneyError> {
        if amount_smallest_unit <= 0 {
            return Err(MoneyError::NonPositive(amount_smallest_unit));
        }
        Self::with_currency(amount_smallest_unit, currency)
    }

    /// Constructs a `Money` without the positivity check, for internal
    /// bookkeeping values (e.g. a zeroed exchange-rate display amount).
    pub fn with_currency(amount_smallest_unit: i64, currency: &str) -> Result<Self, MoneyError> {
        let currency = if currency.is_empty() {
            DEFAULT_CURRENCY
        } else {
            currency
        };
        let bytes = currency.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(MoneyError::InvalidCurrency(currency.to_string()));
        }
        let mut code = [0u8; 3];
        for (i, b) in bytes.iter().enumerate() {
            code[i] = b.to_ascii_uppercase();
        }
        Ok(Money {
            amount_smallest_unit,
            currency: code,
        })
    }

    pub fn amount_smallest_unit(&self) -> i64 {
        self.amount_smallest_unit
    }

    pub fn currency(&self) -> &str {
        std::str::from_utf8(&self.currency).expect("currency is ASCII by construction")
    }

    /// Compares both fields.
    pub fn equals(&self, amount_smallest_unit: i64, currency: &str) -> bool {
        self.amount_smallest_unit == amount_smallest_unit
            && self.currency() == currency.to_ascii_uppercase()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount_smallest_unit, self.currency())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_amount() {
        assert_eq!(Money::new(0, "CNY"), Err(MoneyError::NonPositive(0)));
        assert_eq!(Money::new(-100, "CNY"), Err(MoneyError::NonPositive(-100)));
    }

    #[test]
    fn defaults_empty_currency_to_project_fiat() {
        let m = Money::new(9900, "").unwrap();
        assert_eq!(m.currency(), DEFAULT_CURRENCY);
    }

    #[test]
    fn rejects_malformed_currency() {
        assert!(Money::new(100, "C").is_err());
        assert!(Money::new(100, "CNYY").is_err());
        assert!(Money::new(100, "1NY").is_err());
    }

    #[test]
    fn equals_compares_amount_and_currency() {
        let m = Money::new(9900, "cny").unwrap();
        assert!(m.equals(9900, "CNY"));
        assert!(!m.equals(9901, "CNY"));
        assert!(!m.equals(9900, "USD"));
    }

    #[test]
    fn currency_is_normalized_to_uppercase() {
        let m = Money::new(100, "usd").unwrap();
        assert_eq!(m.currency(), "USD");
    }
}
