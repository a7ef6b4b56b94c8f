//! Order lifecycle service
//!
//! The only writer of order status and refund records. Every mutation is a
//! read-modify-write against [`OrderRepository`] conditioned on the version
//! that was read; version conflicts are retried a bounded number of times and
//! then surfaced as `ConcurrentUpdate`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::application::ports::{Clock, EventPublisher, OrderFilter, OrderRecord, OrderRepository, PromotionCatalog, RepositoryError};
use crate::domain::aggregates::cart::StoreGroup;
use crate::domain::aggregates::promotion::available_for;
use crate::domain::aggregates::refund::mark_refund_complete;
use crate::domain::aggregates::{ActorRole, BankDetails, CartLine, DeliveryInfo, Order, OrderStatus, PaymentMethod, Promotion, RefundRecord};
use crate::domain::events::OrderEvent;
use crate::domain::services::pricing::{compute_breakdown, split_by_store, PriceBreakdown, ShippingContext, ShippingRates};
use crate::domain::value_objects::{CustomerId, Metres, Money, OrderId, PromotionId, StoreId};
use crate::infrastructure::{SystemClock, TracingPublisher};
use crate::{EngineError, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Checkout submission. `distances` are the geocoded store-to-address
/// distances supplied with the delivery information.
#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: CustomerId,
    pub lines: Vec<CartLine>,
    pub delivery: DeliveryInfo,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub promotion_ids: Vec<PromotionId>,
    pub distances: BTreeMap<StoreId, Metres>,
}

#[derive(Clone)]
pub struct OrderLifecycleService {
    orders: Arc<dyn OrderRepository>,
    promotions: Arc<dyn PromotionCatalog>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    rates: ShippingRates,
    max_retries: u32,
}

impl OrderLifecycleService {
    pub fn new(orders: Arc<dyn OrderRepository>, promotions: Arc<dyn PromotionCatalog>) -> Self {
        Self {
            orders, promotions,
            events: Arc::new(TracingPublisher),
            clock: Arc::new(SystemClock),
            rates: ShippingRates::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self { self.events = events; self }
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self { self.clock = clock; self }
    pub fn with_rates(mut self, rates: ShippingRates) -> Self { self.rates = rates; self }
    pub fn with_max_retries(mut self, max_retries: u32) -> Self { self.max_retries = max_retries; self }

    // -------------------------------------------------------------------------
    // Pricing
    // -------------------------------------------------------------------------

    /// Estimated breakdown for a cart; no side effects.
    pub async fn quote(&self, lines: &[CartLine], promotion_ids: &[PromotionId]) -> Result<PriceBreakdown> {
        let promotions = self.promotions.resolve(promotion_ids).await?;
        compute_breakdown(lines, &promotions, &ShippingContext::estimated(self.rates.clone()), self.clock.now())
    }

    /// Promotions a cart of `subtotal` (at `store_id`, when given) could select now.
    pub async fn available_promotions(&self, store_id: Option<StoreId>, subtotal: Money) -> Result<Vec<Promotion>> {
        let catalog = self.promotions.list().await?;
        let groups: Vec<StoreGroup> = store_id.into_iter()
            .map(|store_id| StoreGroup { store_id, lines: vec![], subtotal })
            .collect();
        Ok(available_for(&catalog, &groups, subtotal, self.clock.now()))
    }

    pub async fn list_promotions(&self) -> Result<Vec<Promotion>> {
        Ok(self.promotions.list().await?)
    }

    pub async fn create_promotion(&self, role: ActorRole, promotion: Promotion) -> Result<Promotion> {
        if role != ActorRole::Admin {
            return Err(EngineError::Forbidden { role, action: "manage promotions" });
        }
        promotion.validate()?;
        self.promotions.upsert(promotion.clone()).await?;
        info!(promotion_id = %promotion.id, "promotion saved");
        Ok(promotion)
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Re-prices the cart with authoritative distances and persists one PENDING
    /// order per store. Client-side totals are never consulted.
    pub async fn create_order(&self, request: CheckoutRequest) -> Result<Vec<OrderRecord>> {
        request.delivery.validate().map_err(|e| EngineError::invalid(e.to_string()))?;
        let promotions = self.promotions.resolve(&request.promotion_ids).await?;
        let shipping = ShippingContext::measured(self.rates.clone(), request.distances);
        let now = self.clock.now();

        let cart = compute_breakdown(&request.lines, &promotions, &shipping, now)?;
        let records: Vec<OrderRecord> = split_by_store(&request.lines, &cart, &shipping)?
            .into_iter()
            .map(|part| {
                let applied = part.breakdown.applied.iter().map(|a| a.promotion_id.clone()).collect();
                OrderRecord::new(Order::place(
                    request.customer_id.clone(), part.group.store_id, part.group.lines, request.payment_method,
                    applied, part.breakdown, request.delivery.clone(), now,
                ))
            })
            .collect();

        let stored = self.orders.insert_all(&records).await?;
        for record in &stored {
            let order = &record.order;
            info!(order_id = %order.id, store_id = %order.store_id, total = %order.breakdown.total, "order placed");
            self.publish(&[OrderEvent::OrderPlaced {
                order_id: order.id, customer_id: order.customer_id.clone(), store_id: order.store_id.clone(),
                total: order.breakdown.total, at: now,
            }]).await;
        }
        Ok(stored)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<OrderRecord> {
        self.orders.get(id).await?.ok_or(EngineError::OrderNotFound(id))
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<OrderRecord>> {
        Ok(self.orders.list(filter).await?)
    }

    /// Applies a status change through the state machine. Cancelling a prepaid
    /// order opens its refund record in the same write; `bank` fills in the
    /// transfer destination and is only accepted when a refund is opened.
    pub async fn change_status(&self, id: OrderId, to: OrderStatus, role: ActorRole, bank: Option<BankDetails>) -> Result<OrderRecord> {
        if let Some(details) = &bank {
            details.validate().map_err(|e| EngineError::invalid(e.to_string()))?;
        }
        let (record, events) = self.update(id, |current, now| {
            let transition = current.order.transition(to, role, now)?;
            let from = current.order.status();
            let mut events = vec![OrderEvent::StatusChanged { order_id: id, from, to, role, at: now }];
            let refund = match (transition.refund, &bank) {
                (Some(refund), details) => {
                    events.push(OrderEvent::RefundRequested { order_id: id, amount: current.order.breakdown.total, at: now });
                    Some(match details { Some(d) => refund.with_bank_details(d.clone()), None => refund })
                }
                (None, Some(_)) => return Err(EngineError::invalid("bank details are only accepted when a refund is opened")),
                (None, None) => current.refund.clone(),
            };
            Ok((OrderRecord { order: transition.order, refund, version: current.version }, events))
        }).await?;
        info!(order_id = %id, status = %to, role = %role, "order status changed");
        self.publish(&events).await;
        Ok(record)
    }

    /// Gateway callback: the online payment for this order went through.
    pub async fn record_payment(&self, id: OrderId) -> Result<OrderRecord> {
        let (record, events) = self.update(id, |current, now| {
            let order = current.order.record_payment(now)?;
            Ok((OrderRecord { order, ..current.clone() }, vec![OrderEvent::PaymentRecorded { order_id: id, at: now }]))
        }).await?;
        info!(order_id = %id, "payment recorded");
        self.publish(&events).await;
        Ok(record)
    }

    pub async fn submit_refund_details(&self, id: OrderId, role: ActorRole, details: BankDetails) -> Result<RefundRecord> {
        if !matches!(role, ActorRole::Customer | ActorRole::Admin) {
            return Err(EngineError::Forbidden { role, action: "submit refund details" });
        }
        details.validate().map_err(|e| EngineError::invalid(e.to_string()))?;
        let (_, refund) = self.update(id, |current, _| {
            let refund = current.refund.as_ref()
                .ok_or(EngineError::NoPendingRefund(id))?
                .update_bank_details(details.clone())?;
            Ok((OrderRecord { refund: Some(refund.clone()), ..current.clone() }, refund))
        }).await?;
        Ok(refund)
    }

    pub async fn complete_refund(&self, id: OrderId, role: ActorRole) -> Result<RefundRecord> {
        if !matches!(role, ActorRole::Store | ActorRole::Admin) {
            return Err(EngineError::Forbidden { role, action: "complete refunds" });
        }
        let (_, (refund, at)) = self.update(id, |current, now| {
            let refund = mark_refund_complete(&current.order, current.refund.as_ref())?;
            Ok((OrderRecord { refund: Some(refund.clone()), ..current.clone() }, (refund, now)))
        }).await?;
        info!(order_id = %id, role = %role, "refund completed");
        self.publish(&[OrderEvent::RefundCompleted { order_id: id, role, at }]).await;
        Ok(refund)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Optimistic read-modify-write. `apply` runs against a fresh read on every
    /// attempt; domain errors are returned at once, version conflicts retried.
    async fn update<T, F>(&self, id: OrderId, mut apply: F) -> Result<(OrderRecord, T)>
    where
        F: FnMut(&OrderRecord, DateTime<Utc>) -> Result<(OrderRecord, T)> + Send,
        T: Send,
    {
        let attempts = self.max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let current = self.orders.get(id).await?.ok_or(EngineError::OrderNotFound(id))?;
            let (next, output) = apply(&current, self.clock.now())?;
            match self.orders.save(&next).await {
                Ok(saved) => return Ok((saved, output)),
                Err(RepositoryError::VersionConflict { expected, actual, .. }) => {
                    debug!(order_id = %id, attempt, expected, actual, "version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        warn!(order_id = %id, attempts, "giving up after repeated version conflicts");
        Err(EngineError::ConcurrentUpdate { order_id: id, attempts })
    }

    async fn publish(&self, events: &[OrderEvent]) {
        for event in events {
            if let Err(e) = self.events.publish(event).await {
                warn!(order_id = %event.order_id(), event = event.name(), error = %e, "failed to publish order event");
            }
        }
    }
}
