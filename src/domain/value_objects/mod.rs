//! Value Objects for the ordering engine

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Money value object: a non-negative amount in the smallest currency unit.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn new(amount: u64) -> Self { Self(amount) }
    pub const fn amount(&self) -> u64 { self.0 }
    pub const fn is_zero(&self) -> bool { self.0 == 0 }

    pub fn checked_add(self, other: Money) -> Option<Money> { self.0.checked_add(other.0).map(Money) }
    pub fn checked_mul(self, factor: u64) -> Option<Money> { self.0.checked_mul(factor).map(Money) }
    pub fn saturating_sub(self, other: Money) -> Money { Money(self.0.saturating_sub(other.0)) }

    /// `self * numerator / denominator`, rounded to the nearest unit, half up.
    pub fn mul_div_half_up(self, numerator: u64, denominator: u64) -> Option<Money> {
        if denominator == 0 { return None; }
        let product = u128::from(self.0) * u128::from(numerator);
        let d = u128::from(denominator);
        let rounded = (product + d / 2) / d;
        u64::try_from(rounded).ok().map(Money)
    }

    /// Sums an iterator of amounts, `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(iter: I) -> Option<Money> {
        iter.into_iter().try_fold(Money::ZERO, Money::checked_add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Order identifier (UUID v7, time ordered)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn generate() -> Self { Self(Uuid::now_v7()) }
    pub const fn from_uuid(id: Uuid) -> Self { Self(id) }
    pub const fn as_uuid(&self) -> Uuid { self.0 }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
            pub fn as_str(&self) -> &str { &self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
        }
    };
}

string_id!(
    /// Customer account identifier, issued by the auth collaborator
    CustomerId
);
string_id!(
    /// Store (restaurant) identifier
    StoreId
);
string_id!(FoodId);
string_id!(PromotionId);

/// Delivery distance in metres, as produced by the geocoding collaborator.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metres(u32);

impl Metres {
    pub const fn new(value: u32) -> Self { Self(value) }
    pub const fn value(&self) -> u32 { self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_add() {
        let a = Money::new(100);
        let b = Money::new(50);
        assert_eq!(a.checked_add(b), Some(Money::new(150)));
        assert_eq!(Money::new(u64::MAX).checked_add(Money::new(1)), None);
    }

    #[test]
    fn test_half_up_rounding() {
        assert_eq!(Money::new(25).mul_div_half_up(10, 100), Some(Money::new(3))); // 2.5 -> 3
        assert_eq!(Money::new(24).mul_div_half_up(10, 100), Some(Money::new(2))); // 2.4 -> 2
        assert_eq!(Money::new(5000).mul_div_half_up(1500, 1000), Some(Money::new(7500)));
        assert_eq!(Money::new(1).mul_div_half_up(1, 0), None);
    }

    #[test]
    fn test_checked_sum() {
        assert_eq!(Money::checked_sum([Money::new(1), Money::new(2)]), Some(Money::new(3)));
        assert_eq!(Money::checked_sum([Money::new(u64::MAX), Money::new(1)]), None);
    }

    #[test]
    fn test_money_serializes_as_plain_integer() {
        assert_eq!(serde_json::to_string(&Money::new(15000)).unwrap(), "15000");
        assert!(serde_json::from_str::<Money>("-1").is_err());
    }
}
