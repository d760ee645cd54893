//! Exact on-chain integer amounts and their human-scaled counterparts.

use super::Decimal;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Signed arbitrary-precision integer amount in a token's smallest unit.
///
/// Deltas are signed; balances and supplies are expected to stay non-negative
/// but nothing here enforces it. Serializes as a base-10 JSON string.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExactAmount(BigInt);

impl ExactAmount {
    pub fn new(value: BigInt) -> Self {
        ExactAmount(value)
    }

    pub fn zero() -> Self {
        ExactAmount(BigInt::zero())
    }

    /// `whole × 10^decimals`, handy for building fixtures like `1000 × 10^18`.
    pub fn from_units(whole: i64, decimals: u8) -> Self {
        ExactAmount(BigInt::from(whole) * BigInt::from(10u8).pow(u32::from(decimals)))
    }

    pub fn inner(&self) -> &BigInt {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Human-scaled value: `exact / 10^decimals`, computed exactly.
    pub fn to_scaled(&self, decimals: u8) -> Decimal {
        Decimal::new(BigDecimal::new(self.0.clone(), i64::from(decimals)))
    }

    /// Inverse of [`ExactAmount::to_scaled`]. Digits below the token's precision are truncated.
    pub fn from_scaled(value: &Decimal, decimals: u8) -> Self {
        let (int, _) = value
            .inner()
            .with_scale(i64::from(decimals))
            .into_bigint_and_exponent();
        ExactAmount(int)
    }

    pub fn min(self, other: ExactAmount) -> ExactAmount {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for ExactAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExactAmount {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigInt::from_str(s.trim()).map(ExactAmount)
    }
}

impl From<i64> for ExactAmount {
    fn from(value: i64) -> Self {
        ExactAmount(BigInt::from(value))
    }
}

impl From<BigInt> for ExactAmount {
    fn from(value: BigInt) -> Self {
        ExactAmount(value)
    }
}

impl Serialize for ExactAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for ExactAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ExactAmount::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::ops::Add<&ExactAmount> for &ExactAmount {
    type Output = ExactAmount;

    fn add(self, rhs: &ExactAmount) -> ExactAmount {
        ExactAmount(&self.0 + &rhs.0)
    }
}

impl std::ops::AddAssign<&ExactAmount> for ExactAmount {
    fn add_assign(&mut self, rhs: &ExactAmount) {
        self.0 += &rhs.0;
    }
}

impl std::ops::Sub<&ExactAmount> for &ExactAmount {
    type Output = ExactAmount;

    fn sub(self, rhs: &ExactAmount) -> ExactAmount {
        ExactAmount(&self.0 - &rhs.0)
    }
}

impl std::ops::Neg for &ExactAmount {
    type Output = ExactAmount;

    fn neg(self) -> ExactAmount {
        ExactAmount(-&self.0)
    }
}
