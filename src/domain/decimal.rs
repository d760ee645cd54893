//! Lossless decimal numeric type backed by bigdecimal.
//!
//! Provides canonical parsing from strings and formatting without exponent notation.

use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Arbitrary-precision decimal for human-scaled amounts, prices and values.
///
/// Backed by bigdecimal to avoid floating-point drift across long replays.
/// Serializes to a JSON string.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Decimal(BigDecimal);

impl Decimal {
    /// Create a Decimal from a BigDecimal.
    pub fn new(value: BigDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, bigdecimal::ParseBigDecimalError> {
        BigDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        if self.0.is_zero() {
            return "0".to_string();
        }
        self.0.normalized().to_plain_string()
    }

    /// Get a reference to the underlying BigDecimal.
    pub fn inner(&self) -> &BigDecimal {
        &self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(BigDecimal::zero())
    }

    /// Returns the value 100.
    pub fn hundred() -> Self {
        Decimal(BigDecimal::from(100))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < BigDecimal::zero()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Round half-even to `dp` fractional digits.
    pub fn round_dp(&self, dp: i64) -> Self {
        Decimal(self.0.with_scale_round(dp, RoundingMode::HalfEven))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = bigdecimal::ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<BigDecimal> for Decimal {
    fn from(value: BigDecimal) -> Self {
        Decimal(value)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(BigDecimal::from(value))
    }
}

impl From<Decimal> for BigDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

// Arithmetic operations
impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Add<&Decimal> for &Decimal {
    type Output = Decimal;

    fn add(self, rhs: &Decimal) -> Decimal {
        Decimal(&self.0 + &rhs.0)
    }
}

impl std::ops::AddAssign<&Decimal> for Decimal {
    fn add_assign(&mut self, rhs: &Decimal) {
        self.0 += &rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Sub<&Decimal> for &Decimal {
    type Output = Decimal;

    fn sub(self, rhs: &Decimal) -> Decimal {
        Decimal(&self.0 - &rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Mul<&Decimal> for &Decimal {
    type Output = Decimal;

    fn mul(self, rhs: &Decimal) -> Decimal {
        Decimal(&self.0 * &rhs.0)
    }
}

/// Division. Callers guard against a zero divisor.
impl std::ops::Div<&Decimal> for &Decimal {
    type Output = Decimal;

    fn div(self, rhs: &Decimal) -> Decimal {
        Decimal(&self.0 / &rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}
