//! Food ordering engine
//!
//! Single authority for order lifecycle and pricing, shared by every
//! customer, store, rider and admin surface.
//!
//! ## Features
//! - Integer money pricing: subtotal, per-store shipping, stacked promotions
//! - Role-gated order state machine with terminal states
//! - Refund bookkeeping for cancelled prepaid orders
//! - Optimistic concurrency around every order write
//! - Multi-store checkout fan-out

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

use serde::Serialize;
use thiserror::Error;

use crate::domain::aggregates::order::{ActorRole, OrderStatus};
use crate::domain::aggregates::promotion::IneligibleReason;
use crate::domain::value_objects::{OrderId, PromotionId};

pub use application::service::OrderLifecycleService;
pub use config::Config;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid cart line {index}: {reason}")]
    InvalidLine { index: usize, reason: String },

    #[error("Promotion {promotion_id} is not eligible: {reason}")]
    PromotionNotEligible { promotion_id: PromotionId, reason: IneligibleReason },

    #[error("Cannot move order from {from} to {to} as {role}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus, role: ActorRole },

    #[error("Order is {status} and accepts no further transitions")]
    TerminalState { status: OrderStatus },

    #[error("Order {0} has no pending refund")]
    NoPendingRefund(OrderId),

    #[error("Refund for order {0} is already completed")]
    AlreadyCompleted(OrderId),

    #[error("Order {order_id} was modified concurrently, gave up after {attempts} attempts")]
    ConcurrentUpdate { order_id: OrderId, attempts: u32 },

    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Role {role} may not {action}")]
    Forbidden { role: ActorRole, action: &'static str },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Error taxonomy shared with client surfaces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidInput,
    PromotionNotEligible,
    IllegalTransition,
    TerminalState,
    NoPendingRefund,
    AlreadyCompleted,
    ConcurrentUpdate,
    NotFound,
    Forbidden,
    Storage,
}

impl ErrorKind {
    /// Only concurrent updates may be retried as-is; everything else needs a re-fetch first.
    pub const fn is_retryable(self) -> bool { matches!(self, Self::ConcurrentUpdate) }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::InvalidLine { .. } => ErrorKind::InvalidInput,
            Self::PromotionNotEligible { .. } => ErrorKind::PromotionNotEligible,
            Self::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Self::TerminalState { .. } => ErrorKind::TerminalState,
            Self::NoPendingRefund(_) => ErrorKind::NoPendingRefund,
            Self::AlreadyCompleted(_) => ErrorKind::AlreadyCompleted,
            Self::ConcurrentUpdate { .. } => ErrorKind::ConcurrentUpdate,
            Self::OrderNotFound(_) => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self { Self::InvalidInput(msg.into()) }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_concurrent_update_is_retryable() {
        let id = OrderId::generate();
        assert!(EngineError::ConcurrentUpdate { order_id: id, attempts: 4 }.kind().is_retryable());
        assert!(!EngineError::TerminalState { status: OrderStatus::Completed }.kind().is_retryable());
        assert!(!EngineError::invalid("x").kind().is_retryable());
    }

    #[test]
    fn test_line_errors_are_invalid_input() {
        let err = EngineError::InvalidLine { index: 2, reason: "quantity must be at least 1".into() };
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.to_string(), "Invalid cart line 2: quantity must be at least 1");
    }
}
