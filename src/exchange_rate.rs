//! CNY→USDT exchange-rate port.

use async_trait::async_trait;

/// Converts fiat smallest-unit amounts into USDT smallest-unit amounts.
///
/// Implementations typically call out to a pricing feed; failures are
/// upstream errors the caller may choose to tolerate (a confirmation
/// re-read that fails is warn-logged and the rate recorded as zero rather
/// than failing the whole creation flow).
#[async_trait]
pub trait ExchangeRateService: Send + Sync {
    /// Converts `cny_amount_cents` (CNY, smallest unit = cents) into USDT's
    /// smallest unit (10⁻⁶ USDT), returning the raw amount and the
    /// display-only rate used (USDT per unit of fiat).
    async fn cny_to_usdt(&self, cny_amount_cents: i64) -> Result<ExchangeQuote, ExchangeRateError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeQuote {
    pub usdt_amount_raw: i64,
    pub rate: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum ExchangeRateError {
    #[error("exchange rate feed unavailable: {0}")]
    Unavailable(String),
}

/// A fixed-rate implementation for tests and offline environments.
pub struct FixedExchangeRateService {
    /// USDT smallest units per one CNY smallest unit (cent), e.g.
    /// `rate = 0.0001448` means 1 CNY cent ≈ 0.0001448 USDT ⇒
    /// multiply raw cents by `rate * 1_000_000 / 100` to get USDT micro-units.
    /// We keep it simple: `rate` is USDT-per-CNY-cent directly in USDT
    /// smallest units, so `usdt_amount_raw = cny_amount_cents * numerator / denominator`.
    pub numerator: i64,
    pub denominator: i64,
}

impl FixedExchangeRateService {
    /// A fixed rate of 1 CNY = `rate` USDT, expressed as `numerator/denominator`
    /// scaled so the conversion stays in integer arithmetic.
    pub fn new(numerator: i64, denominator: i64) -> Self {
        FixedExchangeRateService {
            numerator,
            denominator,
        }
    }
}

#[async_trait]
impl ExchangeRateService for FixedExchangeRateService {
    async fn cny_to_usdt(&self, cny_amount_cents: i64) -> Result<ExchangeQuote, ExchangeRateError> {
        let usdt_amount_raw = cny_amount_cents
            .saturating_mul(self.numerator)
            .saturating_div(self.denominator);
        let rate = self.numerator as f64 / self.denominator as f64;
        Ok(ExchangeQuote {
            usdt_amount_raw,
            rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_rate_converts_proportionally() {
        // 1 CNY cent -> 1000 USDT smallest units (arbitrary fixture rate).
        let svc = FixedExchangeRateService::new(1000, 1);
        let quote = svc.cny_to_usdt(9900).await.unwrap();
        assert_eq!(quote.usdt_amount_raw, 9_900_000);
        assert_eq!(quote.rate, 1000.0);
    }
}
