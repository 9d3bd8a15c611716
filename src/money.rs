//! Fixed-point decimal type with 4 decimal places precision.
//!
//! Uses `rust_decimal` internally with scale enforcement so that quantities,
//! unit prices, tax rates and monetary amounts all share one exact numeric
//! representation. Repeated partial shipments and payment waterfalls must not
//! accumulate rounding drift, so every operation rescales back to 4 places.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;

/// A decimal that maintains exactly 4 decimal places.
///
/// All record amounts and quantities in the workbook are stored as this type.
/// Monetary recomputation is always `qty * unit_price` then `* tax_rate`,
/// never derived by subtracting from totals, and those products stay exact
/// at this scale.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use order_ledger::Decimal4;
///
/// let qty = Decimal4::from_str("4").unwrap();
/// let price = Decimal4::from_str("100").unwrap();
/// assert_eq!((qty * price).to_string(), "400.0000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Decimal4(Decimal);

impl Decimal4 {
    /// The number of decimal places to maintain.
    pub const SCALE: u32 = 4;

    /// Zero value.
    pub const ZERO: Self = Decimal4(Decimal::ZERO);

    /// Creates a new `Decimal4` from a `Decimal`, normalizing to 4 decimal places.
    pub fn new(value: Decimal) -> Self {
        let mut normalized = value;
        normalized.rescale(Self::SCALE);
        Decimal4(normalized)
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if this value is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Returns `true` if this value is strictly negative.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Decimal4::new(self.0.abs())
    }

    /// The smaller of `self` and `other`.
    pub fn min(self, other: Self) -> Self {
        if self <= other {
            self
        } else {
            other
        }
    }
}

impl From<i64> for Decimal4 {
    fn from(value: i64) -> Self {
        Decimal4::new(Decimal::from(value))
    }
}

impl From<Decimal> for Decimal4 {
    fn from(value: Decimal) -> Self {
        Decimal4::new(value)
    }
}

impl FromStr for Decimal4 {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = Decimal::from_str(trimmed)?;
        Ok(Decimal4::new(decimal))
    }
}

impl fmt::Display for Decimal4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl Add for Decimal4 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Decimal4::new(self.0 + rhs.0)
    }
}

impl AddAssign for Decimal4 {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Sub for Decimal4 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Decimal4::new(self.0 - rhs.0)
    }
}

impl SubAssign for Decimal4 {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Mul for Decimal4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Decimal4::new(self.0 * rhs.0)
    }
}

impl Sum for Decimal4 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Decimal4::ZERO, |acc, v| acc + v)
    }
}

impl Serialize for Decimal4 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:.4}", self.0))
    }
}

impl<'de> Deserialize<'de> for Decimal4 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // Workbook numeric cells backfilled with the sentinel coerce to zero,
        // keeping downstream arithmetic total.
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Ok(Decimal4::ZERO);
        }
        Decimal4::from_str(trimmed).map_err(serde::de::Error::custom)
    }
}
