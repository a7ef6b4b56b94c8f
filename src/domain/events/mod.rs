//! Domain events, emitted after a write has been committed
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::order::{ActorRole, OrderStatus};
use crate::domain::value_objects::{CustomerId, Money, OrderId, StoreId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderPlaced { order_id: OrderId, customer_id: CustomerId, store_id: StoreId, total: Money, at: DateTime<Utc> },
    StatusChanged { order_id: OrderId, from: OrderStatus, to: OrderStatus, role: ActorRole, at: DateTime<Utc> },
    PaymentRecorded { order_id: OrderId, at: DateTime<Utc> },
    RefundRequested { order_id: OrderId, amount: Money, at: DateTime<Utc> },
    RefundCompleted { order_id: OrderId, role: ActorRole, at: DateTime<Utc> },
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            Self::OrderPlaced { order_id, .. }
            | Self::StatusChanged { order_id, .. }
            | Self::PaymentRecorded { order_id, .. }
            | Self::RefundRequested { order_id, .. }
            | Self::RefundCompleted { order_id, .. } => *order_id,
        }
    }

    /// Subject suffix used by message-bus publishers.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "placed",
            Self::StatusChanged { .. } => "status_changed",
            Self::PaymentRecorded { .. } => "payment_recorded",
            Self::RefundRequested { .. } => "refund_requested",
            Self::RefundCompleted { .. } => "refund_completed",
        }
    }
}
