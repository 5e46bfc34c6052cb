use crate::error::BillingError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ISO 4217 codes accepted by the payment provider.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Dkk,
    Sek,
    Gbp,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Dkk => "DKK",
            Currency::Sek => "SEK",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            "DKK" => Ok(Currency::Dkk),
            "SEK" => Ok(Currency::Sek),
            "GBP" => Ok(Currency::Gbp),
            other => Err(BillingError::ValidationError(format!(
                "Unknown currency '{}'",
                other
            ))),
        }
    }
}

/// A monetary value tagged with its currency.
///
/// Two amounts are only equal when both the value and the currency match:
/// `500 SEK != 500 EUR`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct Money {
    pub value: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Re-labels the amount with another currency, keeping the numeric value.
    ///
    /// This is not a conversion: `500 SEK` becomes `500 EUR`.
    pub fn with_currency(self, currency: Currency) -> Self {
        Self {
            value: self.value,
            currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}
