use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};

/// Signed amount in the transaction's own currency.
/// Negative is a debit (expense), positive is a credit (income).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal)
    }

    pub fn from_units(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_credit(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn is_debit(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }


    /// Rounds to whole currency units, halves away from zero.
    pub fn round_to_units(self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .normalize(),
        )
    }

    /// Drops the fractional part, rounding toward zero.
    pub fn truncate_to_units(self) -> Self {
        Money(self.0.trunc().normalize())
    }

    /// Canonical text form: no trailing zeros, so `500` and `500.00` render alike.
    pub fn canonical(self) -> String {
        self.0.normalize().to_string()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
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

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

impl From<Decimal> for Money {
    fn from(decimal: Decimal) -> Self {
        Money(decimal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn m(s: &str) -> Money {
        Money::from_decimal(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn sign_predicates() {
        assert!(m("200.00").is_credit());
        assert!(m("-50").is_debit());
        assert!(!Money::zero().is_credit());
        assert!(!Money::zero().is_debit());
    }

    #[test]
    fn negation_is_exact() {
        assert_eq!(-m("500"), m("-500"));
        assert_eq!(-m("-12.34"), m("12.34"));
    }

    #[test]
    fn scale_does_not_affect_equality() {
        assert_eq!(m("500"), m("500.00"));
        assert_eq!(m("500").canonical(), m("500.00").canonical());
    }

    #[test]
    fn rounds_halves_away_from_zero() {
        assert_eq!(m("2.5").round_to_units(), m("3"));
        assert_eq!(m("-2.5").round_to_units(), m("-3"));
        assert_eq!(m("1.49").round_to_units(), m("1"));
    }

    #[test]
    fn truncation_goes_toward_zero() {
        assert_eq!(m("-123.99").truncate_to_units(), m("-123"));
        assert_eq!(m("42.7").truncate_to_units(), m("42"));
    }

    #[test]
    fn sums_and_displays() {
        let total: Money = [m("1.10"), m("2.20"), m("-0.30")].into_iter().sum();
        assert_eq!(total, m("3.00"));
        assert_eq!(total.to_string(), "3.00");
    }
}
