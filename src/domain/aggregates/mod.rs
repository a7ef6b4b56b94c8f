//! Aggregates module
pub mod cart;
pub mod order;
pub mod promotion;
pub mod refund;

pub use cart::{CartLine, StoreGroup};
pub use order::{ActorRole, DeliveryInfo, Order, OrderStatus, PaymentMethod, PaymentStatus, Transition};
pub use promotion::{Discount, IneligibleReason, Promotion, PromotionScope};
pub use refund::{BankDetails, RefundRecord, RefundStatus};
