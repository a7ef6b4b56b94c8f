//! Order Aggregate and its lifecycle state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::domain::aggregates::cart::CartLine;
use crate::domain::aggregates::refund::RefundRecord;
use crate::domain::services::pricing::PriceBreakdown;
use crate::domain::value_objects::{CustomerId, OrderId, PromotionId, StoreId};
use crate::{EngineError, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus { Pending, Confirmed, Preparing, Ready, Delivering, Completed, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Pending, Self::Confirmed, Self::Preparing, Self::Ready, Self::Delivering, Self::Completed, Self::Cancelled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Preparing => "PREPARING",
            Self::Ready => "READY",
            Self::Delivering => "DELIVERING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub const fn is_terminal(&self) -> bool { matches!(self, Self::Completed | Self::Cancelled) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = EngineError;
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
            .ok_or_else(|| EngineError::invalid(format!("unknown order status {s:?}")))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole { Customer, Store, Admin, Rider }

impl ActorRole {
    pub const ALL: [ActorRole; 4] = [Self::Customer, Self::Store, Self::Admin, Self::Rider];

    pub const fn as_str(&self) -> &'static str {
        match self { Self::Customer => "customer", Self::Store => "store", Self::Admin => "admin", Self::Rider => "rider" }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod { Cash, Online }

/// Only meaningful for `PaymentMethod::Online`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus { #[default] Unpaid, Paid, Cancelled }

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub const fn as_str(&self) -> &'static str { match self { $(Self::$variant => $s),+ } }
        }
        impl FromStr for $ty {
            type Err = EngineError;
            fn from_str(s: &str) -> Result<Self> {
                match s { $($s => Ok(Self::$variant),)+ _ => Err(EngineError::invalid(format!(concat!("unknown ", stringify!($ty), " {:?}"), s))) }
            }
        }
    };
}

str_enum!(PaymentMethod { Cash => "CASH", Online => "ONLINE" });
str_enum!(PaymentStatus { Unpaid => "UNPAID", Paid => "PAID", Cancelled => "CANCELLED" });

/// Roles allowed to move an order from `from` to `to`; empty when the pair is not a legal edge.
pub const fn allowed_roles(from: OrderStatus, to: OrderStatus) -> &'static [ActorRole] {
    use ActorRole::*;
    use OrderStatus as S;
    match (from, to) {
        (S::Pending, S::Confirmed) | (S::Pending, S::Preparing) | (S::Confirmed, S::Preparing) | (S::Preparing, S::Ready) => &[Store, Admin],
        (S::Pending, S::Cancelled) => &[Customer, Store, Admin],
        (S::Confirmed, S::Cancelled) | (S::Preparing, S::Cancelled) => &[Store, Admin],
        (S::Ready, S::Delivering) | (S::Delivering, S::Completed) => &[Store, Admin, Rider],
        _ => &[],
    }
}

pub fn is_transition_allowed(from: OrderStatus, to: OrderStatus, role: ActorRole) -> bool {
    allowed_roles(from, to).contains(&role)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DeliveryInfo {
    #[validate(length(min = 1, max = 100))]
    pub receiver_name: String,
    #[validate(length(min = 8, max = 15))]
    pub phone_number: String,
    #[validate(length(min = 1, max = 500))]
    pub ship_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub store_id: StoreId,
    pub lines: Vec<CartLine>,
    pub(crate) status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub(crate) payment_status: PaymentStatus,
    pub applied_promotion_ids: Vec<PromotionId>,
    pub breakdown: PriceBreakdown,
    #[serde(flatten)]
    pub delivery: DeliveryInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a successful transition: the new order value and, for cancelled prepaid
/// orders, the freshly opened refund record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub order: Order,
    pub refund: Option<RefundRecord>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        customer_id: CustomerId, store_id: StoreId, lines: Vec<CartLine>, payment_method: PaymentMethod,
        applied_promotion_ids: Vec<PromotionId>, breakdown: PriceBreakdown, delivery: DeliveryInfo, now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::generate(), customer_id, store_id, lines, status: OrderStatus::Pending,
            payment_method, payment_status: PaymentStatus::Unpaid, applied_promotion_ids, breakdown,
            delivery, created_at: now, updated_at: now,
        }
    }

    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn is_prepaid(&self) -> bool {
        self.payment_method == PaymentMethod::Online && self.payment_status == PaymentStatus::Paid
    }

    /// Validates `to` against the transition table for `role` and returns the moved order.
    pub fn transition(&self, to: OrderStatus, role: ActorRole, now: DateTime<Utc>) -> Result<Transition> {
        if self.status.is_terminal() {
            return Err(EngineError::TerminalState { status: self.status });
        }
        if !is_transition_allowed(self.status, to, role) {
            return Err(EngineError::IllegalTransition { from: self.status, to, role });
        }
        let mut next = self.clone();
        next.status = to;
        next.updated_at = now;
        let mut refund = None;
        if to == OrderStatus::Cancelled && self.payment_method == PaymentMethod::Online {
            match self.payment_status {
                PaymentStatus::Paid => refund = Some(RefundRecord::requested(self.id)),
                PaymentStatus::Unpaid => next.payment_status = PaymentStatus::Cancelled,
                PaymentStatus::Cancelled => {}
            }
        }
        Ok(Transition { order: next, refund })
    }

    /// Records the gateway's confirmation of an online payment.
    pub fn record_payment(&self, now: DateTime<Utc>) -> Result<Order> {
        if self.payment_method != PaymentMethod::Online {
            return Err(EngineError::invalid(format!("order {} is paid in cash", self.id)));
        }
        if self.status == OrderStatus::Cancelled || self.payment_status != PaymentStatus::Unpaid {
            return Err(EngineError::invalid(format!(
                "order {} cannot record a payment while {} / {}", self.id, self.status, self.payment_status.as_str()
            )));
        }
        let mut next = self.clone();
        next.payment_status = PaymentStatus::Paid;
        next.updated_at = now;
        Ok(next)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::aggregates::refund::RefundStatus;
    use crate::domain::value_objects::Money;
    use crate::ErrorKind;
    use chrono::TimeZone;
    use proptest::prelude::*;

    pub(crate) fn sample_order(payment_method: PaymentMethod) -> Order {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let breakdown = PriceBreakdown {
            subtotal: Money::new(100_000), shipping_fee: Money::new(15_000), discount: Money::ZERO,
            total: Money::new(115_000), estimated: false, applied: vec![],
        };
        Order::place(
            CustomerId::new("C1"), StoreId::new("S1"), vec![CartLine::new("pho", "S1", 50_000, 2)],
            payment_method, vec![], breakdown,
            DeliveryInfo { receiver_name: "An".into(), phone_number: "0901234567".into(), ship_address: "1 Le Loi".into(), note: None },
            now,
        )
    }

    pub(crate) fn at(order: &Order, status: OrderStatus) -> Order {
        let mut o = order.clone();
        o.status = status;
        o
    }

    fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 1, 15, 13, 0, 0).unwrap() }

    #[test]
    fn test_order_workflow() {
        let mut order = sample_order(PaymentMethod::Cash);
        for (to, role) in [
            (OrderStatus::Confirmed, ActorRole::Store),
            (OrderStatus::Preparing, ActorRole::Store),
            (OrderStatus::Ready, ActorRole::Admin),
            (OrderStatus::Delivering, ActorRole::Rider),
            (OrderStatus::Completed, ActorRole::Rider),
        ] {
            order = order.transition(to, role, now()).unwrap().order;
            assert_eq!(order.status(), to);
        }
        assert_eq!(order.updated_at, now());
    }

    #[test]
    fn test_transition_does_not_mutate_source() {
        let order = sample_order(PaymentMethod::Cash);
        let moved = order.transition(OrderStatus::Confirmed, ActorRole::Store, now()).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(moved.order.status(), OrderStatus::Confirmed);
    }

    #[test]
    fn test_customer_cancels_pending_then_terminal() {
        let order = sample_order(PaymentMethod::Cash);
        let cancelled = order.transition(OrderStatus::Cancelled, ActorRole::Customer, now()).unwrap();
        assert_eq!(cancelled.order.status(), OrderStatus::Cancelled);
        assert!(cancelled.refund.is_none());
        let err = cancelled.order.transition(OrderStatus::Preparing, ActorRole::Store, now()).unwrap_err();
        assert_eq!(err, EngineError::TerminalState { status: OrderStatus::Cancelled });
    }

    #[test]
    fn test_store_cannot_cancel_ready_order() {
        let order = at(&sample_order(PaymentMethod::Cash), OrderStatus::Ready);
        let err = order.transition(OrderStatus::Cancelled, ActorRole::Store, now()).unwrap_err();
        assert_eq!(err, EngineError::IllegalTransition { from: OrderStatus::Ready, to: OrderStatus::Cancelled, role: ActorRole::Store });
    }

    #[test]
    fn test_customer_cannot_cancel_confirmed_order() {
        let order = at(&sample_order(PaymentMethod::Cash), OrderStatus::Confirmed);
        let err = order.transition(OrderStatus::Cancelled, ActorRole::Customer, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    }

    #[test]
    fn test_no_skipping_ahead() {
        let order = sample_order(PaymentMethod::Cash);
        let err = order.transition(OrderStatus::Ready, ActorRole::Admin, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTransition);
    }

    #[test]
    fn test_cancelling_paid_online_order_opens_refund() {
        let paid = sample_order(PaymentMethod::Online).record_payment(now()).unwrap();
        let t = paid.transition(OrderStatus::Cancelled, ActorRole::Customer, now()).unwrap();
        let refund = t.refund.unwrap();
        assert_eq!(refund.order_id, paid.id);
        assert_eq!(refund.status, RefundStatus::Pending);
        assert!(refund.requested);
        assert_eq!(t.order.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_cancelling_unpaid_online_order_cancels_payment() {
        let order = sample_order(PaymentMethod::Online);
        let t = order.transition(OrderStatus::Cancelled, ActorRole::Store, now()).unwrap();
        assert!(t.refund.is_none());
        assert_eq!(t.order.payment_status(), PaymentStatus::Cancelled);
    }

    #[test]
    fn test_record_payment_rules() {
        assert_eq!(sample_order(PaymentMethod::Cash).record_payment(now()).unwrap_err().kind(), ErrorKind::InvalidInput);
        let paid = sample_order(PaymentMethod::Online).record_payment(now()).unwrap();
        assert_eq!(paid.payment_status(), PaymentStatus::Paid);
        assert!(paid.is_prepaid());
        assert!(paid.record_payment(now()).is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
        assert_eq!("ONLINE".parse::<PaymentMethod>().unwrap(), PaymentMethod::Online);
    }

    fn any_status() -> impl Strategy<Value = OrderStatus> { proptest::sample::select(OrderStatus::ALL.to_vec()) }
    fn any_role() -> impl Strategy<Value = ActorRole> { proptest::sample::select(ActorRole::ALL.to_vec()) }

    proptest! {
        #[test]
        fn prop_transition_matches_table(from in any_status(), to in any_status(), role in any_role()) {
            let order = at(&sample_order(PaymentMethod::Cash), from);
            let result = order.transition(to, role, now());
            if from.is_terminal() {
                prop_assert_eq!(result.unwrap_err(), EngineError::TerminalState { status: from });
            } else if is_transition_allowed(from, to, role) {
                prop_assert_eq!(result.unwrap().order.status(), to);
            } else {
                prop_assert_eq!(result.unwrap_err(), EngineError::IllegalTransition { from, to, role });
            }
        }

        #[test]
        fn prop_cancellation_window(from in any_status(), role in any_role()) {
            let allowed = is_transition_allowed(from, OrderStatus::Cancelled, role);
            let window = matches!(from, OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Preparing);
            prop_assert!(!allowed || window);
        }
    }
}
