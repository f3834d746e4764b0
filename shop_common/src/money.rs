use std::{
    fmt::Display,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of units of a single product on a cart or order line.
pub type Quantity = u32;

/// The largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: Quantity = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid currency code: {0}. Expected three uppercase letters, e.g. USD")]
    InvalidCurrency(String),
}

//--------------------------------------     MinorUnits      ---------------------------------------------------------
/// An amount of money, expressed as an integer number of currency minor units (e.g. cents).
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, AddAssign, add_assign);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for MinorUnits {
    type Error = MoneyError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| MoneyError::InvalidAmount(format!("{value} is too large to represent in minor units")))
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl MinorUnits {
    pub const ZERO: Self = Self(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| MoneyError::InvalidAmount(format!("{self} + {rhs} overflows")))
    }

    pub fn checked_mul(self, quantity: Quantity) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or_else(|| MoneyError::InvalidAmount(format!("{self} x {quantity} overflows")))
    }
}

/// `quantity × unit_price`. Negative unit prices and overflow are rejected.
pub fn line_subtotal(quantity: Quantity, unit_price: MinorUnits) -> Result<MinorUnits, MoneyError> {
    if unit_price.is_negative() {
        return Err(MoneyError::InvalidAmount(format!("Unit price cannot be negative ({unit_price})")));
    }
    unit_price.checked_mul(quantity)
}

/// Sums a set of non-negative amounts. Negative amounts and overflow are rejected.
pub fn sum<I>(amounts: I) -> Result<MinorUnits, MoneyError>
where I: IntoIterator<Item = MinorUnits> {
    amounts.into_iter().try_fold(MinorUnits::ZERO, |acc, amount| {
        if amount.is_negative() {
            return Err(MoneyError::InvalidAmount(format!("Cannot sum a negative amount ({amount})")));
        }
        acc.checked_add(amount)
    })
}

//--------------------------------------    CurrencyCode     ---------------------------------------------------------
/// An ISO-4217 currency code: exactly three uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self("USD".to_string())
    }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 3 && s.chars().all(|c| c.is_ascii_uppercase()) {
            Ok(Self(s.to_string()))
        } else {
            Err(MoneyError::InvalidCurrency(s.to_string()))
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------        Money        ---------------------------------------------------------
/// An amount tagged with its currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: MinorUnits,
    pub currency: CurrencyCode,
}

impl Money {
    pub fn new(amount: MinorUnits, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }
}

/// Renders the amount in major units with two decimal places. This is the only place minor units are divided.
impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.amount.value();
        let sign = if value < 0 { "-" } else { "" };
        let abs = value.unsigned_abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}
