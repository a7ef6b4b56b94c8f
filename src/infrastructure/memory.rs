//! In-memory storage, used when no database is configured and in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::application::ports::{OrderFilter, OrderRecord, OrderRepository, PromotionCatalog, RepositoryError};
use crate::domain::aggregates::Promotion;
use crate::domain::value_objects::{OrderId, PromotionId};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, OrderRecord>>,
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get(&self, id: OrderId) -> Result<Option<OrderRecord>, RepositoryError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn insert_all(&self, records: &[OrderRecord]) -> Result<Vec<OrderRecord>, RepositoryError> {
        let mut orders = self.orders.write().await;
        if let Some(dup) = records.iter().find(|r| orders.contains_key(&r.order.id)) {
            return Err(RepositoryError::Storage(format!("order {} already exists", dup.order.id)));
        }
        let stored: Vec<OrderRecord> = records.iter().map(|r| OrderRecord { version: 1, ..r.clone() }).collect();
        for record in &stored {
            orders.insert(record.order.id, record.clone());
        }
        Ok(stored)
    }

    async fn save(&self, record: &OrderRecord) -> Result<OrderRecord, RepositoryError> {
        let mut orders = self.orders.write().await;
        let id = record.order.id;
        let current = orders.get(&id).ok_or(RepositoryError::NotFound(id))?;
        if current.version != record.version {
            return Err(RepositoryError::VersionConflict { order_id: id, expected: record.version, actual: current.version });
        }
        let saved = OrderRecord { version: record.version + 1, ..record.clone() };
        orders.insert(id, saved.clone());
        Ok(saved)
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderRecord>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<OrderRecord> = orders.values().filter(|r| filter.matches(&r.order)).cloned().collect();
        matching.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at).then(b.order.id.cmp(&a.order.id)));
        matching.truncate(filter.effective_limit() as usize);
        Ok(matching)
    }
}

/// Catalog kept in insertion order so listings are stable.
#[derive(Default)]
pub struct InMemoryPromotionCatalog {
    promotions: RwLock<Vec<Promotion>>,
}

#[async_trait]
impl PromotionCatalog for InMemoryPromotionCatalog {
    async fn get(&self, id: &PromotionId) -> Result<Option<Promotion>, RepositoryError> {
        Ok(self.promotions.read().await.iter().find(|p| &p.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Promotion>, RepositoryError> {
        Ok(self.promotions.read().await.clone())
    }

    async fn upsert(&self, promotion: Promotion) -> Result<(), RepositoryError> {
        let mut promotions = self.promotions.write().await;
        match promotions.iter_mut().find(|p| p.id == promotion.id) {
            Some(existing) => *existing = promotion,
            None => promotions.push(promotion),
        }
        Ok(())
    }
}
