//! Promotion definitions and catalog helpers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::aggregates::cart::StoreGroup;
use crate::domain::value_objects::{Money, PromotionId, StoreId};
use crate::{EngineError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionScope {
    Global,
    Store { store_id: StoreId },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Discount {
    /// `percent` in 1..=100, optionally capped.
    Percent { percent: u8, max_discount: Option<Money> },
    Amount { amount: Money },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub title: String,
    pub scope: PromotionScope,
    pub discount: Discount,
    pub minimum_spend: Money,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Why a selected promotion cannot be applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IneligibleReason {
    Inactive,
    NotStarted,
    Expired,
    StoreMismatch,
    BelowMinimumSpend { minimum: Money, actual: Money },
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "promotion is inactive"),
            Self::NotStarted => write!(f, "promotion has not started"),
            Self::Expired => write!(f, "promotion has expired"),
            Self::StoreMismatch => write!(f, "promotion belongs to another store"),
            Self::BelowMinimumSpend { minimum, actual } => write!(f, "minimum spend {minimum} not reached ({actual})"),
        }
    }
}

impl Promotion {
    /// Checks the definition invariants; used before a promotion enters the catalog.
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().is_empty() { return Err(EngineError::invalid("promotion id is required")); }
        match &self.discount {
            Discount::Percent { percent, .. } if *percent == 0 || *percent > 100 => {
                return Err(EngineError::invalid(format!("promotion {}: percent must be within 1..=100", self.id)));
            }
            Discount::Amount { amount } if amount.is_zero() => {
                return Err(EngineError::invalid(format!("promotion {}: amount must be positive", self.id)));
            }
            _ => {}
        }
        if self.starts_at >= self.ends_at {
            return Err(EngineError::invalid(format!("promotion {}: start must precede end", self.id)));
        }
        Ok(())
    }

    /// The amount this promotion's minimum spend and percent are measured against:
    /// the whole cart for GLOBAL, the lines of its store for STORE.
    pub fn base_amount(&self, groups: &[StoreGroup], cart_subtotal: Money) -> Option<Money> {
        match &self.scope {
            PromotionScope::Global => Some(cart_subtotal),
            PromotionScope::Store { store_id } => groups.iter().find(|g| &g.store_id == store_id).map(|g| g.subtotal),
        }
    }

    /// Eligibility against a base amount (`None` when the scope does not match the order).
    pub fn check_eligibility(&self, base: Option<Money>, now: DateTime<Utc>) -> std::result::Result<Money, IneligibleReason> {
        if !self.is_active { return Err(IneligibleReason::Inactive); }
        if now < self.starts_at { return Err(IneligibleReason::NotStarted); }
        if now > self.ends_at { return Err(IneligibleReason::Expired); }
        let base = base.ok_or(IneligibleReason::StoreMismatch)?;
        if base < self.minimum_spend {
            return Err(IneligibleReason::BelowMinimumSpend { minimum: self.minimum_spend, actual: base });
        }
        Ok(base)
    }

    /// Raw discount on an eligible base, before any clamping against the order total.
    pub fn discount_on(&self, base: Money) -> Option<Money> {
        match &self.discount {
            Discount::Percent { percent, max_discount } => {
                let amount = base.mul_div_half_up(u64::from(*percent), 100)?;
                Some(max_discount.map_or(amount, |cap| amount.min(cap)))
            }
            Discount::Amount { amount } => Some(*amount),
        }
    }
}

/// Promotions a checkout over `groups` could select right now, in catalog order.
pub fn available_for(promotions: &[Promotion], groups: &[StoreGroup], cart_subtotal: Money, now: DateTime<Utc>) -> Vec<Promotion> {
    promotions.iter()
        .filter(|p| p.check_eligibility(p.base_amount(groups, cart_subtotal), now).is_ok())
        .cloned()
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap() }

    pub(crate) fn percent_promo(id: &str, scope: PromotionScope, percent: u8, minimum_spend: u64, cap: Option<u64>) -> Promotion {
        Promotion {
            id: PromotionId::new(id), title: format!("{percent}% off"), scope,
            discount: Discount::Percent { percent, max_discount: cap.map(Money::new) },
            minimum_spend: Money::new(minimum_spend),
            starts_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            is_active: true,
        }
    }

    pub(crate) fn amount_promo(id: &str, scope: PromotionScope, amount: u64, minimum_spend: u64) -> Promotion {
        Promotion { discount: Discount::Amount { amount: Money::new(amount) }, title: format!("{amount} off"), ..percent_promo(id, scope, 10, minimum_spend, None) }
    }

    pub(crate) fn store(id: &str) -> PromotionScope { PromotionScope::Store { store_id: StoreId::new(id) } }

    fn group(store: &str, subtotal: u64) -> StoreGroup {
        StoreGroup { store_id: StoreId::new(store), lines: vec![], subtotal: Money::new(subtotal) }
    }

    #[test]
    fn test_validate_rejects_bad_definitions() {
        assert!(percent_promo("P", PromotionScope::Global, 0, 0, None).validate().is_err());
        assert!(percent_promo("P", PromotionScope::Global, 101, 0, None).validate().is_err());
        assert!(amount_promo("A", PromotionScope::Global, 0, 0).validate().is_err());
        let mut reversed = percent_promo("P", PromotionScope::Global, 10, 0, None);
        reversed.ends_at = reversed.starts_at;
        assert!(reversed.validate().is_err());
        assert!(percent_promo("P", PromotionScope::Global, 100, 0, None).validate().is_ok());
    }

    #[test]
    fn test_eligibility_reasons() {
        let p = percent_promo("P", store("S1"), 10, 50_000, None);
        assert_eq!(p.check_eligibility(Some(Money::new(60_000)), now()), Ok(Money::new(60_000)));
        assert_eq!(p.check_eligibility(None, now()), Err(IneligibleReason::StoreMismatch));
        assert!(matches!(p.check_eligibility(Some(Money::new(40_000)), now()), Err(IneligibleReason::BelowMinimumSpend { .. })));
        let inactive = Promotion { is_active: false, ..p.clone() };
        assert_eq!(inactive.check_eligibility(Some(Money::new(60_000)), now()), Err(IneligibleReason::Inactive));
        let late = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(p.check_eligibility(Some(Money::new(60_000)), late), Err(IneligibleReason::Expired));
    }

    #[test]
    fn test_percent_discount_respects_cap() {
        let capped = percent_promo("P", PromotionScope::Global, 50, 0, Some(20_000));
        assert_eq!(capped.discount_on(Money::new(100_000)), Some(Money::new(20_000)));
        assert_eq!(capped.discount_on(Money::new(10_000)), Some(Money::new(5_000)));
    }

    #[test]
    fn test_available_for_filters_by_store_and_spend() {
        let catalog = vec![
            percent_promo("S1-10", store("S1"), 10, 50_000, None),
            percent_promo("S2-10", store("S2"), 10, 0, None),
            amount_promo("ALL", PromotionScope::Global, 10_000, 80_000),
        ];
        let groups = vec![group("S1", 60_000), group("S3", 30_000)];
        let ids: Vec<_> = available_for(&catalog, &groups, Money::new(90_000), now()).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PromotionId::new("S1-10"), PromotionId::new("ALL")]);
    }
}
