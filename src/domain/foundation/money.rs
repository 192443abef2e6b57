//! Money value object backed by exact decimal arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Currencies the billing engine settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    /// Returns the ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// An exact monetary amount in a single currency.
///
/// Amounts are decimals, never floats. Negative amounts represent
/// credits owed to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Creates an amount in the given currency.
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a USD amount.
    pub fn usd(amount: Decimal) -> Self {
        Self::new(amount, Currency::Usd)
    }

    /// Creates a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Returns the decimal amount.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Checks whether the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Checks whether the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Checks whether the amount is a credit (less than zero).
    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Adds two amounts.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the currencies differ.
    pub fn checked_add(&self, other: &Money) -> Result<Money, ValidationError> {
        self.require_same_currency(other)?;
        Ok(Money::new(self.amount + other.amount, self.currency))
    }

    /// Subtracts another amount from this one.
    ///
    /// The result may be negative.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the currencies differ.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, ValidationError> {
        self.require_same_currency(other)?;
        Ok(Money::new(self.amount - other.amount, self.currency))
    }

    /// Rounds to two decimal places, half away from zero.
    ///
    /// 6.666... rounds to 6.67 and -6.665 rounds to -6.67.
    pub fn rounded(&self) -> Money {
        Money::new(
            self.amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            self.currency,
        )
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), ValidationError> {
        if self.currency != other.currency {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("Cannot combine {} with {}", self.currency, other.currency),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency.code())
    }
}
