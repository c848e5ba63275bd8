//! Money value object.
//!
//! Amounts are held as integer minor units (cents) of the single configured
//! currency. Negative amounts are unrepresentable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Non-negative amount in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Money(i64);

impl Money {
    /// The zero amount. Items priced at zero are free.
    pub const ZERO: Money = Money(0);

    /// Creates an amount from cents, rejecting negatives.
    pub fn from_cents(cents: i64) -> Result<Self, ValidationError> {
        if cents < 0 {
            return Err(ValidationError::out_of_range("amount", 0, i64::MAX, cents));
        }
        Ok(Self(cents))
    }

    /// Parses a decimal string such as `"10"`, `"10.5"` or `"10.00"`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ValidationError::empty_field("amount"));
        }

        let (whole, frac) = match input.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (input, ""),
        };

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(frac) {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("'{}' is not a non-negative decimal", input),
            ));
        }
        if frac.len() > 2 {
            return Err(ValidationError::invalid_format(
                "amount",
                "at most two fractional digits are allowed",
            ));
        }

        let overflow = || ValidationError::invalid_format("amount", "amount is too large");
        let whole: i64 = whole.parse().map_err(|_| overflow())?;
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| overflow())? * 10,
            _ => frac.parse().map_err(|_| overflow())?,
        };

        whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .map(Self)
            .ok_or_else(overflow)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// True for the zero amount.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<i64> for Money {
    type Error = ValidationError;

    fn try_from(cents: i64) -> Result<Self, Self::Error> {
        Self::from_cents(cents)
    }
}

impl From<Money> for i64 {
    fn from(money: Money) -> Self {
        money.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(Money::parse("10").unwrap().cents(), 1000);
        assert_eq!(Money::parse("10.5").unwrap().cents(), 1050);
        assert_eq!(Money::parse("10.00").unwrap().cents(), 1000);
        assert_eq!(Money::parse("0.07").unwrap().cents(), 7);
    }

    #[test]
    fn rejects_negative_and_malformed_amounts() {
        assert!(Money::parse("-1.00").is_err());
        assert!(Money::parse("1.234").is_err());
        assert!(Money::parse("abc").is_err());
        assert!(Money::parse(".50").is_err());
        assert!(Money::parse("").is_err());
        assert!(Money::from_cents(-1).is_err());
    }

    #[test]
    fn displays_two_decimal_places() {
        assert_eq!(Money::from_cents(1000).unwrap().to_string(), "10.00");
        assert_eq!(Money::from_cents(5).unwrap().to_string(), "0.05");
    }

    #[test]
    fn deserializing_negative_cents_fails() {
        let result: Result<Money, _> = serde_json::from_str("-5");
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn display_then_parse_preserves_cents(cents in 0i64..1_000_000_000_000) {
            let money = Money::from_cents(cents).unwrap();
            prop_assert_eq!(Money::parse(&money.to_string()).unwrap(), money);
        }

        #[test]
        fn zero_is_the_only_free_amount(cents in 0i64..10_000) {
            let money = Money::from_cents(cents).unwrap();
            prop_assert_eq!(money.is_zero(), cents == 0);
        }
    }
}
