//! Refund ledger for cancelled prepaid orders

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::aggregates::order::{Order, OrderStatus};
use crate::domain::value_objects::OrderId;
use crate::{EngineError, Result};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus { #[default] None, Pending, Completed }

/// Destination account the customer wants the refund sent to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BankDetails {
    #[validate(length(min = 1, max = 100))]
    pub bank_name: String,
    #[validate(length(min = 4, max = 34))]
    pub bank_account: String,
}

/// Side record keyed by order id; absent for orders that never needed a refund.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub order_id: OrderId,
    pub requested: bool,
    pub status: RefundStatus,
    pub bank_name: Option<String>,
    pub bank_account: Option<String>,
}

impl RefundRecord {
    pub fn requested(order_id: OrderId) -> Self {
        Self { order_id, requested: true, status: RefundStatus::Pending, bank_name: None, bank_account: None }
    }

    pub fn with_bank_details(mut self, details: BankDetails) -> Self {
        self.bank_name = Some(details.bank_name);
        self.bank_account = Some(details.bank_account);
        self
    }

    fn ensure_pending(&self) -> Result<()> {
        match self.status {
            RefundStatus::Pending => Ok(()),
            RefundStatus::Completed => Err(EngineError::AlreadyCompleted(self.order_id)),
            RefundStatus::None => Err(EngineError::NoPendingRefund(self.order_id)),
        }
    }

    /// Replaces the transfer destination while the refund is still pending.
    pub fn update_bank_details(&self, details: BankDetails) -> Result<RefundRecord> {
        self.ensure_pending()?;
        Ok(self.clone().with_bank_details(details))
    }
}

/// Marks the pending refund of a cancelled order as paid out.
///
/// A second call reports `AlreadyCompleted` so callers can tell a no-op from a real change.
pub fn mark_refund_complete(order: &Order, refund: Option<&RefundRecord>) -> Result<RefundRecord> {
    if order.status() != OrderStatus::Cancelled {
        return Err(EngineError::NoPendingRefund(order.id));
    }
    let record = refund.ok_or(EngineError::NoPendingRefund(order.id))?;
    record.ensure_pending()?;
    Ok(RefundRecord { status: RefundStatus::Completed, requested: false, ..record.clone() })
}
