//! Storage, clock and event seams of the lifecycle service.
//!
//! Implementations live in `crate::infrastructure`: in-memory for tests and
//! single-node runs, PostgreSQL for production.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::aggregates::{Order, OrderStatus, Promotion, RefundRecord};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{CustomerId, OrderId, PromotionId, StoreId};
use crate::EngineError;

/// Persisted unit: the order, its optional refund side record, and the
/// optimistic-concurrency version they are written under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    #[serde(flatten)]
    pub order: Order,
    pub refund: Option<RefundRecord>,
    pub version: u64,
}

impl OrderRecord {
    pub fn new(order: Order) -> Self { Self { order, refund: None, version: 0 } }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Order {order_id} is at version {actual}, expected {expected}")]
    VersionConflict { order_id: OrderId, expected: u64, actual: u64 },

    #[error("Order {0} not found")]
    NotFound(OrderId),

    #[error("{0}")]
    Storage(String),
}

impl From<RepositoryError> for EngineError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::VersionConflict { order_id, .. } => EngineError::ConcurrentUpdate { order_id, attempts: 1 },
            RepositoryError::NotFound(id) => EngineError::OrderNotFound(id),
            RepositoryError::Storage(msg) => EngineError::Storage(msg),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct OrderFilter {
    pub customer_id: Option<CustomerId>,
    pub store_id: Option<StoreId>,
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
}

impl OrderFilter {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn effective_limit(&self) -> u32 { self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT) }

    pub fn matches(&self, order: &Order) -> bool {
        self.customer_id.as_ref().map_or(true, |c| c == &order.customer_id)
            && self.store_id.as_ref().map_or(true, |s| s == &order.store_id)
            && self.status.map_or(true, |s| s == order.status())
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get(&self, id: OrderId) -> Result<Option<OrderRecord>, RepositoryError>;

    /// Persists freshly placed orders, all or none. Stored records start at version 1.
    async fn insert_all(&self, records: &[OrderRecord]) -> Result<Vec<OrderRecord>, RepositoryError>;

    /// Writes order and refund together if the stored version still equals
    /// `record.version`; returns the stored record with the bumped version.
    async fn save(&self, record: &OrderRecord) -> Result<OrderRecord, RepositoryError>;

    /// Newest first.
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderRecord>, RepositoryError>;
}

#[async_trait]
pub trait PromotionCatalog: Send + Sync {
    async fn get(&self, id: &PromotionId) -> Result<Option<Promotion>, RepositoryError>;

    async fn list(&self) -> Result<Vec<Promotion>, RepositoryError>;

    async fn upsert(&self, promotion: Promotion) -> Result<(), RepositoryError>;

    /// Looks up a selection, preserving its order. Unknown or repeated ids are invalid input.
    async fn resolve(&self, ids: &[PromotionId]) -> crate::Result<Vec<Promotion>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id) {
                return Err(EngineError::invalid(format!("promotion {id} selected twice")));
            }
            let promotion = self.get(id).await?
                .ok_or_else(|| EngineError::invalid(format!("unknown promotion {id}")))?;
            resolved.push(promotion);
        }
        Ok(resolved)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> anyhow::Result<()>;
}
