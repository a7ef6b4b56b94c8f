//! Cart snapshot

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::value_objects::{FoodId, Money, StoreId};
use crate::{EngineError, Result};

/// One line of a cart or order snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct CartLine {
    pub food_id: FoodId,
    pub store_id: StoreId,
    pub unit_price: Money,
    /// Size/variant surcharge.
    #[serde(default)]
    pub option_price: Money,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

impl CartLine {
    pub fn new(food_id: impl Into<String>, store_id: impl Into<String>, unit_price: u64, quantity: u32) -> Self {
        Self {
            food_id: FoodId::new(food_id), store_id: StoreId::new(store_id),
            unit_price: Money::new(unit_price), option_price: Money::ZERO, quantity, note: None,
        }
    }

    pub fn with_option_price(mut self, option_price: u64) -> Self { self.option_price = Money::new(option_price); self }

    /// `(unitPrice + optionPrice) * quantity`
    pub fn line_subtotal(&self) -> Option<Money> {
        self.unit_price.checked_add(self.option_price)?.checked_mul(u64::from(self.quantity))
    }
}

/// Lines of one store within a cart, in first-appearance order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreGroup {
    pub store_id: StoreId,
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
}

/// Checks every line invariant and returns the cart subtotal.
pub fn subtotal(lines: &[CartLine]) -> Result<Money> {
    if lines.is_empty() { return Err(EngineError::invalid("cart is empty")); }
    let mut total = Money::ZERO;
    for (index, line) in lines.iter().enumerate() {
        total = total.checked_add(checked_line_subtotal(index, line)?)
            .ok_or_else(|| EngineError::invalid("cart subtotal overflows"))?;
    }
    Ok(total)
}

/// Splits a cart into per-store groups, keeping the order in which stores first appear.
pub fn group_by_store(lines: &[CartLine]) -> Result<Vec<StoreGroup>> {
    let mut groups: Vec<StoreGroup> = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let line_total = checked_line_subtotal(index, line)?;
        let group = match groups.iter().position(|g| g.store_id == line.store_id) {
            Some(pos) => &mut groups[pos],
            None => {
                groups.push(StoreGroup { store_id: line.store_id.clone(), lines: vec![], subtotal: Money::ZERO });
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };
        group.subtotal = group.subtotal.checked_add(line_total)
            .ok_or_else(|| EngineError::invalid("store subtotal overflows"))?;
        group.lines.push(line.clone());
    }
    Ok(groups)
}

fn checked_line_subtotal(index: usize, line: &CartLine) -> Result<Money> {
    if line.quantity == 0 {
        return Err(EngineError::InvalidLine { index, reason: "quantity must be at least 1".into() });
    }
    if line.store_id.as_str().is_empty() || line.food_id.as_str().is_empty() {
        return Err(EngineError::InvalidLine { index, reason: "food and store ids are required".into() });
    }
    line.line_subtotal().ok_or_else(|| EngineError::InvalidLine { index, reason: "line amount overflows".into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_line_subtotal_includes_option_price() {
        let line = CartLine::new("pho", "S1", 40_000, 2).with_option_price(5_000);
        assert_eq!(line.line_subtotal(), Some(Money::new(90_000)));
    }

    #[test]
    fn test_subtotal_rejects_zero_quantity() {
        let lines = vec![CartLine::new("pho", "S1", 40_000, 1), CartLine::new("tea", "S1", 10_000, 0)];
        let err = subtotal(&lines).unwrap_err();
        assert!(matches!(err, EngineError::InvalidLine { index: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_subtotal_rejects_empty_cart() {
        assert_eq!(subtotal(&[]).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_subtotal_rejects_overflow() {
        let lines = vec![CartLine::new("gold", "S1", u64::MAX, 2)];
        assert!(matches!(subtotal(&lines), Err(EngineError::InvalidLine { index: 0, .. })));
    }

    #[test]
    fn test_group_by_store_keeps_first_appearance_order() {
        let lines = vec![
            CartLine::new("a", "S2", 10_000, 1),
            CartLine::new("b", "S1", 20_000, 2),
            CartLine::new("c", "S2", 5_000, 3),
        ];
        let groups = group_by_store(&lines).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].store_id, StoreId::new("S2"));
        assert_eq!(groups[0].subtotal, Money::new(25_000));
        assert_eq!(groups[0].lines.len(), 2);
        assert_eq!(groups[1].subtotal, Money::new(40_000));
    }
}
