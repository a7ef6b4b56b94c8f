//! HTTP surface

pub mod handlers;
pub mod labels;

use axum::{http::StatusCode, response::{IntoResponse, Response}, routing::{get, patch, post}, Json, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{EngineError, ErrorKind, OrderLifecycleService};

#[derive(Clone)]
pub struct AppState {
    pub service: OrderLifecycleService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "food-order-engine"})) }))
        .route("/api/v1/quote", post(handlers::quote))
        .route("/api/v1/orders", get(handlers::list_orders).post(handlers::create_order))
        .route("/api/v1/orders/:id", get(handlers::get_order))
        .route("/api/v1/orders/:id/status", patch(handlers::change_status))
        .route("/api/v1/orders/:id/payment", post(handlers::record_payment))
        .route("/api/v1/orders/:id/refund/details", post(handlers::submit_refund_details))
        .route("/api/v1/orders/:id/refund/complete", post(handlers::complete_refund))
        .route("/api/v1/promotions", get(handlers::list_promotions).post(handlers::create_promotion))
        .route("/api/v1/order-statuses", get(handlers::status_labels))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ErrorKind {
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PromotionNotEligible => StatusCode::UNPROCESSABLE_ENTITY,
            Self::IllegalTransition | Self::TerminalState | Self::NoPendingRefund | Self::AlreadyCompleted | Self::ConcurrentUpdate => StatusCode::CONFLICT,
            Self::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Storage {
            tracing::error!(error = %self, "storage failure");
        }
        let body = ErrorBody { kind, message: self.to_string(), retryable: kind.is_retryable() };
        (kind.status_code(), Json(body)).into_response()
    }
}
