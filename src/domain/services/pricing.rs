//! Pricing calculator
//!
//! Pure functions turning a cart snapshot and a selection of promotions into a
//! [`PriceBreakdown`]. Every amount is integer [`Money`]; fractional results round
//! half up. Promotions stack additively in the caller's selection order and the
//! combined discount is clamped so the total never goes below zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::aggregates::cart::{group_by_store, StoreGroup};
use crate::domain::aggregates::promotion::{Promotion, PromotionScope};
use crate::domain::aggregates::CartLine;
use crate::domain::value_objects::{Metres, Money, PromotionId, StoreId};
use crate::{EngineError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRates {
    pub base_fee: Money,
    pub per_km_fee: Money,
    /// Substituted for every store while the delivery address is not geocoded yet.
    pub average_distance: Metres,
}

impl Default for ShippingRates {
    fn default() -> Self {
        Self { base_fee: Money::new(15_000), per_km_fee: Money::new(5_000), average_distance: Metres::new(3_000) }
    }
}

impl ShippingRates {
    /// `baseFee + perKmFee * km`, with `km = metres / 1000` rounded half up on the product.
    pub fn fee_for(&self, distance: Metres) -> Option<Money> {
        let distance_fee = self.per_km_fee.mul_div_half_up(u64::from(distance.value()), 1_000)?;
        self.base_fee.checked_add(distance_fee)
    }
}

/// Where shipping distances come from: the average constant while quoting, or
/// the geocoded per-store distances once the delivery address is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShippingContext {
    rates: ShippingRates,
    distances: Option<BTreeMap<StoreId, Metres>>,
}

impl ShippingContext {
    pub fn estimated(rates: ShippingRates) -> Self { Self { rates, distances: None } }
    pub fn measured(rates: ShippingRates, distances: BTreeMap<StoreId, Metres>) -> Self { Self { rates, distances: Some(distances) } }
    pub fn is_estimated(&self) -> bool { self.distances.is_none() }

    pub fn fee_for_store(&self, store_id: &StoreId) -> Result<Money> {
        let distance = match &self.distances {
            None => self.rates.average_distance,
            Some(known) => *known.get(store_id)
                .ok_or_else(|| EngineError::invalid(format!("no delivery distance for store {store_id}")))?,
        };
        self.rates.fee_for(distance).ok_or_else(|| EngineError::invalid("shipping fee overflows"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppliedPromotion {
    pub promotion_id: PromotionId,
    pub scope: PromotionScope,
    /// On a cart breakdown, the amount before clamping; on a store's share, the part charged to that store.
    pub amount: Money,
}

/// Invariants: `total = subtotal + shipping_fee - discount` and `discount <= subtotal + shipping_fee`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub discount: Money,
    pub total: Money,
    /// Shipping used the average distance; not authoritative for charging.
    pub estimated: bool,
    #[serde(default)]
    pub applied: Vec<AppliedPromotion>,
}

impl PriceBreakdown {
    fn assemble(subtotal: Money, shipping_fee: Money, discount: Money, applied: Vec<AppliedPromotion>, estimated: bool) -> Result<Self> {
        let gross = subtotal.checked_add(shipping_fee).ok_or_else(|| EngineError::invalid("order amount overflows"))?;
        let discount = discount.min(gross);
        Ok(Self { subtotal, shipping_fee, discount, total: gross.saturating_sub(discount), estimated, applied })
    }
}

/// One store's share of a multi-store checkout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreBreakdown {
    pub group: StoreGroup,
    pub breakdown: PriceBreakdown,
}

/// Computes the price breakdown of a cart.
///
/// Every selected promotion must be eligible; an ineligible one is refused with
/// `PromotionNotEligible` rather than skipped. The discount is the sum of what
/// [`split_by_store`] charges each store, so a cart and its orders always agree.
pub fn compute_breakdown(
    lines: &[CartLine],
    promotions: &[Promotion],
    shipping: &ShippingContext,
    now: DateTime<Utc>,
) -> Result<PriceBreakdown> {
    let groups = group_by_store(lines)?;
    if groups.is_empty() { return Err(EngineError::invalid("cart is empty")); }
    let subtotal = Money::checked_sum(groups.iter().map(|g| g.subtotal))
        .ok_or_else(|| EngineError::invalid("cart subtotal overflows"))?;
    let fees = store_fees(&groups, shipping)?;
    let shipping_fee = Money::checked_sum(fees.iter().copied())
        .ok_or_else(|| EngineError::invalid("shipping total overflows"))?;

    let mut seen = HashSet::new();
    let mut applied = Vec::with_capacity(promotions.len());
    for promotion in promotions {
        if !seen.insert(&promotion.id) {
            return Err(EngineError::invalid(format!("promotion {} selected twice", promotion.id)));
        }
        let base = promotion.check_eligibility(promotion.base_amount(&groups, subtotal), now)
            .map_err(|reason| EngineError::PromotionNotEligible { promotion_id: promotion.id.clone(), reason })?;
        let amount = promotion.discount_on(base).ok_or_else(|| EngineError::invalid("discount overflows"))?;
        applied.push(AppliedPromotion { promotion_id: promotion.id.clone(), scope: promotion.scope.clone(), amount });
    }

    let shares = allocate(&groups, &fees, &applied)?;
    let discount = Money::checked_sum(shares.iter().flatten().map(|a| a.amount))
        .ok_or_else(|| EngineError::invalid("discount overflows"))?;
    PriceBreakdown::assemble(subtotal, shipping_fee, discount, applied, shipping.is_estimated())
}

/// Splits a cart-level breakdown into one breakdown per store.
///
/// Each store's order carries the promotion amounts charged to that store,
/// so the store totals add up to `cart.total`.
pub fn split_by_store(lines: &[CartLine], cart: &PriceBreakdown, shipping: &ShippingContext) -> Result<Vec<StoreBreakdown>> {
    let groups = group_by_store(lines)?;
    let fees = store_fees(&groups, shipping)?;
    let shares = allocate(&groups, &fees, &cart.applied)?;
    groups.into_iter()
        .zip(fees)
        .zip(shares)
        .map(|((group, fee), share)| {
            let discount = Money::checked_sum(share.iter().map(|a| a.amount))
                .ok_or_else(|| EngineError::invalid("discount overflows"))?;
            let breakdown = PriceBreakdown::assemble(group.subtotal, fee, discount, share, shipping.is_estimated())?;
            Ok(StoreBreakdown { group, breakdown })
        })
        .collect()
}

/// Charges promotion amounts to stores, never past a store's `subtotal + shipping`.
///
/// STORE promotions go to their own store first. GLOBAL promotions then fill the
/// remaining room store by store in cart order, carrying whatever one store cannot
/// absorb on to the next. Each store's share keeps the selection order.
fn allocate(groups: &[StoreGroup], fees: &[Money], applied: &[AppliedPromotion]) -> Result<Vec<Vec<AppliedPromotion>>> {
    let mut room = groups.iter().zip(fees)
        .map(|(g, fee)| g.subtotal.checked_add(*fee).ok_or_else(|| EngineError::invalid("order amount overflows")))
        .collect::<Result<Vec<Money>>>()?;
    let mut shares: Vec<Vec<(usize, AppliedPromotion)>> = vec![Vec::new(); groups.len()];
    let mut charge = |store: usize, selection: usize, promotion: &AppliedPromotion, wanted: Money| -> Money {
        let take = wanted.min(room[store]);
        if !take.is_zero() {
            room[store] = room[store].saturating_sub(take);
            shares[store].push((selection, AppliedPromotion { amount: take, ..promotion.clone() }));
        }
        take
    };

    for (selection, promotion) in applied.iter().enumerate() {
        if let PromotionScope::Store { store_id } = &promotion.scope {
            let store = groups.iter().position(|g| &g.store_id == store_id)
                .ok_or_else(|| EngineError::invalid(format!("promotion {} is for a store not in the cart", promotion.promotion_id)))?;
            charge(store, selection, promotion, promotion.amount);
        }
    }
    for (selection, promotion) in applied.iter().enumerate() {
        if promotion.scope != PromotionScope::Global { continue; }
        let mut left = promotion.amount;
        for store in 0..groups.len() {
            if left.is_zero() { break; }
            left = left.saturating_sub(charge(store, selection, promotion, left));
        }
    }

    Ok(shares.into_iter()
        .map(|mut share| {
            share.sort_by_key(|(selection, _)| *selection);
            share.into_iter().map(|(_, promotion)| promotion).collect()
        })
        .collect())
}

fn store_fees(groups: &[StoreGroup], shipping: &ShippingContext) -> Result<Vec<Money>> {
    groups.iter().map(|g| shipping.fee_for_store(&g.store_id)).collect()
}
