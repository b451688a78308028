use axum::routing::{get, post};
use axum::Router;
use serde::de::DeserializeOwned;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::SharedState;

mod health;
mod review;
mod transactions;
mod webhook;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/webhook/sepay", post(webhook::receive_sepay))
        .route("/webhook/email", post(webhook::receive_email))
        .route("/stats", get(transactions::stats))
        .route("/transactions/recent", get(transactions::recent))
        .route("/transactions/by-account/{account}", get(transactions::by_account))
        .route("/transactions/by-category/{category}", get(transactions::by_category))
        .route("/transactions/{id}/category", post(transactions::set_category))
        .route("/review/pending", get(review::pending))
        .route("/categories/{account_type}", get(review::categories))
        .route("/patterns", post(review::add_pattern))
        .route("/patterns/refresh", post(review::refresh_patterns))
        .route("/reports/category/{category}", get(review::category_report))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Parse a JSON request body. Empty bodies, `null` and `{}` count as no data.
fn json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    let value: serde_json::Value = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?
    };

    let empty = match &value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(AppError::BadRequest("No data provided".to_string()));
    }

    serde_json::from_value(value).map_err(|e| AppError::BadRequest(format!("Invalid payload: {e}")))
}
