use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;
use thiserror::Error;

/// An amount in Vietnamese đồng. VND has no minor unit, so values are kept
/// rounded to whole đồng and serialize as integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Invalid amount: '{0}'")]
    Invalid(String),
}

impl Money {
    pub fn from_dong(dong: i64) -> Self {
        Money(Decimal::from(dong))
    }

    /// Saturates at `i64::MAX` for values that do not fit.
    pub fn to_dong(self) -> i64 {
        self.0.round().to_i64().unwrap_or(i64::MAX)
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(0))
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    /// Accepts plain numerals with optional `,` thousands separators,
    /// e.g. `"2,277,000"` or `"28000.0"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return Err(MoneyError::Invalid(s.to_string()));
        }
        Decimal::from_str(&cleaned)
            .or_else(|_| Decimal::from_scientific(&cleaned))
            .map(Money::from_decimal)
            .map_err(|_| MoneyError::Invalid(s.to_string()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dong = self.to_dong();
        let digits = dong.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        let sign = if dong < 0 { "-" } else { "" };
        write!(f, "{sign}{grouped} VND")
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_dong())
    }
}

/// Accepts numbers and numeric strings.
impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <Decimal as Deserialize>::deserialize(deserializer).map(Money::from_decimal)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_and_grouped() {
        assert_eq!("28000".parse::<Money>().unwrap(), Money::from_dong(28_000));
        assert_eq!(
            "2,277,000".parse::<Money>().unwrap(),
            Money::from_dong(2_277_000)
        );
        assert_eq!(" 150000.0 ".parse::<Money>().unwrap(), Money::from_dong(150_000));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("12 đ".parse::<Money>().is_err());
    }

    #[test]
    fn from_decimal_rounds_to_whole_dong() {
        let m = Money::from_decimal(Decimal::new(123456, 2)); // 1234.56
        assert_eq!(m.to_dong(), 1235);
    }

    #[test]
    fn display_groups_thousands() {
        assert_eq!(Money::from_dong(0).to_string(), "0 VND");
        assert_eq!(Money::from_dong(999).to_string(), "999 VND");
        assert_eq!(Money::from_dong(5_000).to_string(), "5,000 VND");
        assert_eq!(Money::from_dong(19_077_000).to_string(), "19,077,000 VND");
        assert_eq!(Money::from_dong(-28_000).to_string(), "-28,000 VND");
    }

    #[test]
    fn serializes_as_whole_dong() {
        assert_eq!(serde_json::to_string(&Money::from_dong(28_000)).unwrap(), "28000");
        let m: Money = serde_json::from_str("1100.4").unwrap();
        assert_eq!(m, Money::from_dong(1_100));
        let m: Money = serde_json::from_str("\"5000\"").unwrap();
        assert_eq!(m, Money::from_dong(5_000));
    }

    #[test]
    fn deserializes_mixed_json_amounts() {
        let amounts: Vec<Option<Money>> =
            serde_json::from_str(r#"[45000, "28000", null]"#).unwrap();
        assert_eq!(
            amounts,
            [
                Some(Money::from_dong(45_000)),
                Some(Money::from_dong(28_000)),
                None,
            ]
        );
        assert!(serde_json::from_str::<Money>(r#""abc""#).is_err());
    }

    #[test]
    fn arithmetic_and_sum() {
        let total: Money = [1_000, 2_000, 3_000].into_iter().map(Money::from_dong).sum();
        assert_eq!(total, Money::from_dong(6_000));
        assert_eq!(total - Money::from_dong(6_000), Money::zero());
        assert!(Money::from_dong(-1).is_negative());
        assert!(!Money::zero().is_negative());
        assert_eq!(Money::from_dong(-1).abs(), Money::from_dong(1));
    }
}
