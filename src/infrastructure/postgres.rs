//! PostgreSQL storage
//!
//! One row per order; lines, breakdown and the refund side record are JSONB
//! columns. `version` carries the optimistic-concurrency counter: every update
//! is conditioned on it and bumps it by one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::application::ports::{OrderFilter, OrderRecord, OrderRepository, PromotionCatalog, RepositoryError};
use crate::domain::aggregates::{CartLine, DeliveryInfo, Discount, Order, Promotion, PromotionScope, RefundRecord};
use crate::domain::services::pricing::PriceBreakdown;
use crate::domain::value_objects::{CustomerId, Money, OrderId, PromotionId, StoreId};

fn storage(e: impl std::fmt::Display) -> RepositoryError { RepositoryError::Storage(e.to_string()) }

fn to_i64(value: u64) -> Result<i64, RepositoryError> { i64::try_from(value).map_err(storage) }
fn to_u64(value: i64) -> Result<u64, RepositoryError> { u64::try_from(value).map_err(storage) }

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: String,
    store_id: String,
    status: String,
    payment_method: String,
    payment_status: String,
    lines: Json<Vec<CartLine>>,
    applied_promotion_ids: Json<Vec<PromotionId>>,
    breakdown: Json<PriceBreakdown>,
    refund: Option<Json<RefundRecord>>,
    receiver_name: String,
    phone_number: String,
    ship_address: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let order = Order {
            id: OrderId::from_uuid(row.id),
            customer_id: CustomerId::new(row.customer_id),
            store_id: StoreId::new(row.store_id),
            lines: row.lines.0,
            status: row.status.parse().map_err(storage)?,
            payment_method: row.payment_method.parse().map_err(storage)?,
            payment_status: row.payment_status.parse().map_err(storage)?,
            applied_promotion_ids: row.applied_promotion_ids.0,
            breakdown: row.breakdown.0,
            delivery: DeliveryInfo {
                receiver_name: row.receiver_name, phone_number: row.phone_number,
                ship_address: row.ship_address, note: row.note,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        Ok(OrderRecord { order, refund: row.refund.map(|r| r.0), version: to_u64(row.version)? })
    }
}

const ORDER_COLUMNS: &str = "id, customer_id, store_id, status, payment_method, payment_status, lines, \
    applied_promotion_ids, breakdown, refund, receiver_name, phone_number, ship_address, note, \
    created_at, updated_at, version";

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn get(&self, id: OrderId) -> Result<Option<OrderRecord>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool).await.map_err(storage)?
            .map(OrderRecord::try_from)
            .transpose()
    }

    async fn insert_all(&self, records: &[OrderRecord]) -> Result<Vec<OrderRecord>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let mut stored = Vec::with_capacity(records.len());
        for record in records {
            let o = &record.order;
            sqlx::query(&format!(
                "INSERT INTO orders ({ORDER_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, 1)"
            ))
            .bind(o.id.as_uuid()).bind(o.customer_id.as_str()).bind(o.store_id.as_str())
            .bind(o.status().as_str()).bind(o.payment_method.as_str()).bind(o.payment_status().as_str())
            .bind(Json(&o.lines)).bind(Json(&o.applied_promotion_ids)).bind(Json(&o.breakdown))
            .bind(record.refund.as_ref().map(Json))
            .bind(&o.delivery.receiver_name).bind(&o.delivery.phone_number).bind(&o.delivery.ship_address).bind(&o.delivery.note)
            .bind(o.created_at).bind(o.updated_at)
            .execute(&mut *tx).await.map_err(storage)?;
            stored.push(OrderRecord { version: 1, ..record.clone() });
        }
        tx.commit().await.map_err(storage)?;
        Ok(stored)
    }

    async fn save(&self, record: &OrderRecord) -> Result<OrderRecord, RepositoryError> {
        let o = &record.order;
        let expected = to_i64(record.version)?;
        let result = sqlx::query(
            "UPDATE orders SET status = $3, payment_status = $4, lines = $5, applied_promotion_ids = $6, \
             breakdown = $7, refund = $8, updated_at = $9, version = version + 1 \
             WHERE id = $1 AND version = $2",
        )
        .bind(o.id.as_uuid()).bind(expected)
        .bind(o.status().as_str()).bind(o.payment_status().as_str())
        .bind(Json(&o.lines)).bind(Json(&o.applied_promotion_ids)).bind(Json(&o.breakdown))
        .bind(record.refund.as_ref().map(Json))
        .bind(o.updated_at)
        .execute(&self.pool).await.map_err(storage)?;

        if result.rows_affected() == 0 {
            let actual: Option<(i64,)> = sqlx::query_as("SELECT version FROM orders WHERE id = $1")
                .bind(o.id.as_uuid())
                .fetch_optional(&self.pool).await.map_err(storage)?;
            return Err(match actual {
                None => RepositoryError::NotFound(o.id),
                Some((actual,)) => RepositoryError::VersionConflict { order_id: o.id, expected: record.version, actual: to_u64(actual)? },
            });
        }
        Ok(OrderRecord { version: record.version + 1, ..record.clone() })
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderRecord>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::text IS NULL OR customer_id = $1) \
               AND ($2::text IS NULL OR store_id = $2) \
               AND ($3::text IS NULL OR status = $3) \
             ORDER BY created_at DESC, id DESC LIMIT $4"
        ))
        .bind(filter.customer_id.as_ref().map(CustomerId::as_str))
        .bind(filter.store_id.as_ref().map(StoreId::as_str))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(i64::from(filter.effective_limit()))
        .fetch_all(&self.pool).await.map_err(storage)?
        .into_iter()
        .map(OrderRecord::try_from)
        .collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PromotionRow {
    id: String,
    title: String,
    scope: Json<PromotionScope>,
    discount: Json<Discount>,
    minimum_spend: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    is_active: bool,
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = RepositoryError;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        Ok(Promotion {
            id: PromotionId::new(row.id), title: row.title, scope: row.scope.0, discount: row.discount.0,
            minimum_spend: Money::new(to_u64(row.minimum_spend)?),
            starts_at: row.starts_at, ends_at: row.ends_at, is_active: row.is_active,
        })
    }
}

const PROMOTION_COLUMNS: &str = "id, title, scope, discount, minimum_spend, starts_at, ends_at, is_active";

#[derive(Clone)]
pub struct PgPromotionCatalog {
    pool: PgPool,
}

impl PgPromotionCatalog {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl PromotionCatalog for PgPromotionCatalog {
    async fn get(&self, id: &PromotionId) -> Result<Option<Promotion>, RepositoryError> {
        sqlx::query_as::<_, PromotionRow>(&format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool).await.map_err(storage)?
            .map(Promotion::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Promotion>, RepositoryError> {
        sqlx::query_as::<_, PromotionRow>(&format!("SELECT {PROMOTION_COLUMNS} FROM promotions ORDER BY starts_at, id"))
            .fetch_all(&self.pool).await.map_err(storage)?
            .into_iter()
            .map(Promotion::try_from)
            .collect()
    }

    async fn upsert(&self, p: Promotion) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO promotions ({PROMOTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET title = EXCLUDED.title, scope = EXCLUDED.scope, \
             discount = EXCLUDED.discount, minimum_spend = EXCLUDED.minimum_spend, \
             starts_at = EXCLUDED.starts_at, ends_at = EXCLUDED.ends_at, is_active = EXCLUDED.is_active"
        ))
        .bind(p.id.as_str()).bind(&p.title).bind(Json(&p.scope)).bind(Json(&p.discount))
        .bind(to_i64(p.minimum_spend.amount())?).bind(p.starts_at).bind(p.ends_at).bind(p.is_active)
        .execute(&self.pool).await.map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::sample_order;
    use crate::domain::aggregates::{OrderStatus, PaymentMethod};

    fn row_for(order: &Order, status: &str) -> OrderRow {
        OrderRow {
            id: order.id.as_uuid(), customer_id: order.customer_id.to_string(), store_id: order.store_id.to_string(),
            status: status.into(), payment_method: "ONLINE".into(), payment_status: "PAID".into(),
            lines: Json(order.lines.clone()), applied_promotion_ids: Json(vec![]), breakdown: Json(order.breakdown.clone()),
            refund: Some(Json(RefundRecord::requested(order.id))),
            receiver_name: "An".into(), phone_number: "0901234567".into(), ship_address: "1 Le Loi".into(), note: None,
            created_at: order.created_at, updated_at: order.updated_at, version: 4,
        }
    }

    #[test]
    fn test_row_conversion() {
        let order = sample_order(PaymentMethod::Online);
        let record = OrderRecord::try_from(row_for(&order, "CANCELLED")).unwrap();
        assert_eq!(record.order.status(), OrderStatus::Cancelled);
        assert!(record.order.is_prepaid());
        assert_eq!(record.version, 4);
        assert!(record.refund.is_some());
    }

    #[test]
    fn test_row_with_unknown_status_is_storage_error() {
        let order = sample_order(PaymentMethod::Online);
        assert!(matches!(OrderRecord::try_from(row_for(&order, "SHIPPED")), Err(RepositoryError::Storage(_))));
    }
}
