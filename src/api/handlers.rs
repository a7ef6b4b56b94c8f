//! Request handlers. Thin: decode, validate shape, delegate to the service.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::labels::{label_table, Locale, StatusLabel};
use crate::api::AppState;
use crate::application::{CheckoutRequest, OrderFilter, OrderRecord};
use crate::domain::aggregates::{ActorRole, BankDetails, CartLine, OrderStatus, Promotion, RefundRecord};
use crate::domain::services::pricing::PriceBreakdown;
use crate::domain::value_objects::{Money, OrderId, PromotionId, StoreId};
use crate::{EngineError, Result};

fn validate_lines(lines: &[CartLine]) -> Result<()> {
    for (index, line) in lines.iter().enumerate() {
        line.validate().map_err(|e| EngineError::InvalidLine { index, reason: e.to_string() })?;
    }
    Ok(())
}

fn invalid(e: validator::ValidationErrors) -> EngineError { EngineError::invalid(e.to_string()) }

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub promotion_ids: Vec<PromotionId>,
}

pub async fn quote(State(s): State<AppState>, Json(r): Json<QuoteRequest>) -> Result<Json<PriceBreakdown>> {
    validate_lines(&r.lines)?;
    Ok(Json(s.service.quote(&r.lines, &r.promotion_ids).await?))
}

pub async fn create_order(State(s): State<AppState>, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<Vec<OrderRecord>>)> {
    validate_lines(&r.lines)?;
    let orders = s.service.create_order(r).await?;
    Ok((StatusCode::CREATED, Json(orders)))
}

pub async fn list_orders(State(s): State<AppState>, Query(filter): Query<OrderFilter>) -> Result<Json<Vec<OrderRecord>>> {
    Ok(Json(s.service.list_orders(&filter).await?))
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<OrderRecord>> {
    Ok(Json(s.service.get_order(OrderId::from_uuid(id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: OrderStatus,
    pub actor_role: ActorRole,
    #[serde(default)]
    pub refund: Option<BankDetails>,
}

pub async fn change_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ChangeStatusRequest>) -> Result<Json<OrderRecord>> {
    Ok(Json(s.service.change_status(OrderId::from_uuid(id), r.status, r.actor_role, r.refund).await?))
}

pub async fn record_payment(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<OrderRecord>> {
    Ok(Json(s.service.record_payment(OrderId::from_uuid(id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct RefundDetailsRequest {
    pub actor_role: ActorRole,
    #[serde(flatten)]
    pub bank: BankDetails,
}

pub async fn submit_refund_details(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<RefundDetailsRequest>) -> Result<Json<RefundRecord>> {
    r.bank.validate().map_err(invalid)?;
    Ok(Json(s.service.submit_refund_details(OrderId::from_uuid(id), r.actor_role, r.bank).await?))
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor_role: ActorRole,
}

pub async fn complete_refund(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ActorRequest>) -> Result<Json<RefundRecord>> {
    Ok(Json(s.service.complete_refund(OrderId::from_uuid(id), r.actor_role).await?))
}

#[derive(Debug, Deserialize)]
pub struct PromotionParams {
    pub store_id: Option<StoreId>,
    /// When present, only promotions a cart of this subtotal could select now.
    pub subtotal: Option<u64>,
}

pub async fn list_promotions(State(s): State<AppState>, Query(p): Query<PromotionParams>) -> Result<Json<Vec<Promotion>>> {
    let promotions = match p.subtotal {
        Some(subtotal) => s.service.available_promotions(p.store_id, Money::new(subtotal)).await?,
        None => s.service.list_promotions().await?,
    };
    Ok(Json(promotions))
}

#[derive(Debug, Deserialize)]
pub struct CreatePromotionRequest {
    pub actor_role: ActorRole,
    pub promotion: Promotion,
}

pub async fn create_promotion(State(s): State<AppState>, Json(r): Json<CreatePromotionRequest>) -> Result<(StatusCode, Json<Promotion>)> {
    let promotion = s.service.create_promotion(r.actor_role, r.promotion).await?;
    Ok((StatusCode::CREATED, Json(promotion)))
}

#[derive(Debug, Deserialize)]
pub struct LabelParams {
    #[serde(default)]
    pub lang: Locale,
}

pub async fn status_labels(Query(p): Query<LabelParams>) -> Json<Vec<StatusLabel>> {
    Json(label_table(p.lang))
}
