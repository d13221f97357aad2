//! Amount type for agreement prices and ledger balances

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents an amount in the smallest indivisible unit (lamports, cents, stroops)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Amount(pub u64);

impl Amount {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Convert a signed offer price. Negative prices have no amount.
    pub fn from_signed(value: i64) -> Option<Self> {
        u64::try_from(value).ok().map(Self)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_signed() {
        assert_eq!(Amount::from_signed(10), Some(Amount::new(10)));
        assert_eq!(Amount::from_signed(0), Some(Amount::zero()));
        assert_eq!(Amount::from_signed(-1), None);
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(Amount::new(5).checked_sub(Amount::new(6)), None);
        assert_eq!(Amount::new(u64::MAX).checked_add(Amount::new(1)), None);
        assert_eq!(
            Amount::new(5).checked_add(Amount::new(6)),
            Some(Amount::new(11))
        );
    }
}
