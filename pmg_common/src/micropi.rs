use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const PI_CURRENCY_CODE: &str = "PI";
pub const PI_CURRENCY_CODE_LOWER: &str = "pi";

//--------------------------------------      MicroPi       ----------------------------------------------------------
/// An amount of Pi, expressed in millionths of a π. All ledger arithmetic in the gateway is done in
/// integer µπ to avoid floating-point drift.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MicroPi(i64);

op!(binary MicroPi, Add, add);
op!(binary MicroPi, Sub, sub);
op!(inplace MicroPi, SubAssign, sub_assign);
op!(unary MicroPi, Neg, neg);

impl Mul<i64> for MicroPi {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for MicroPi {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in microPi: {0}")]
pub struct MicroPiConversionError(String);

impl From<i64> for MicroPi {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for MicroPi {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for MicroPi {}

impl TryFrom<u64> for MicroPi {
    type Error = MicroPiConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MicroPiConversionError(format!("Value {} is too large to convert to MicroPi", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for MicroPi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.unsigned_abs() < 10_000 {
            write!(f, "{}µπ", self.0)
        } else {
            let pi = self.0 as f64 / 1_000_000.0;
            write!(f, "{pi:0.3}π")
        }
    }
}

impl MicroPi {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_pi(pi: i64) -> Self {
        Self(pi * 1_000_000)
    }

    /// The portion of this amount that is paid out to a store after the marketplace commission
    /// (expressed in basis points) has been withheld. Rounds down to the nearest µπ.
    pub fn less_commission(&self, commission_bps: i64) -> Self {
        let kept = 10_000 - commission_bps.clamp(0, 10_000);
        Self(self.0 * kept / 10_000)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(MicroPi::from(250).to_string(), "250µπ");
        assert_eq!(MicroPi::from_pi(3).to_string(), "3.000π");
        assert_eq!(MicroPi::from(1_500_000).to_string(), "1.500π");
    }

    #[test]
    fn arithmetic() {
        let a = MicroPi::from_pi(10);
        let b = MicroPi::from_pi(4);
        assert_eq!(a + b, MicroPi::from_pi(14));
        assert_eq!(a - b, MicroPi::from_pi(6));
        assert_eq!(-b, MicroPi::from(-4_000_000));
        let mut c = a;
        c -= b;
        assert_eq!(c, MicroPi::from_pi(6));
        assert_eq!(a * 3, MicroPi::from_pi(30));
        let total: MicroPi = [a, b, c].into_iter().sum();
        assert_eq!(total, MicroPi::from_pi(20));
    }

    #[test]
    fn commission() {
        // 5% commission on a 10π order leaves a 9.5π payout
        assert_eq!(MicroPi::from_pi(10).less_commission(500), MicroPi::from(9_500_000));
        assert_eq!(MicroPi::from(1).less_commission(500), MicroPi::from(0));
        assert_eq!(MicroPi::from_pi(1).less_commission(0), MicroPi::from_pi(1));
    }
}
