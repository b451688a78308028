use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tally_core::{AccountType, KnownPattern, MonthKey, Transaction};
use tally_ingest::{CategorySummary, PromoteOutcome, REVIEW_BATCH};

use super::json_body;
use crate::error::AppError;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct PendingItem {
    #[serde(flatten)]
    transaction: Transaction,
    suggested_pattern: Option<String>,
}

#[derive(Serialize)]
pub struct PendingList {
    count: usize,
    transactions: Vec<PendingItem>,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    limit: Option<u32>,
}

pub async fn pending(
    State(state): State<SharedState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<PendingList>, AppError> {
    let limit = query.limit.unwrap_or(REVIEW_BATCH);
    let transactions: Vec<PendingItem> = tally_ingest::pending_review(state.store(), limit)
        .await?
        .into_iter()
        .map(|transaction| PendingItem {
            suggested_pattern: tally_ingest::suggest_pattern(&transaction.content),
            transaction,
        })
        .collect();
    Ok(Json(PendingList {
        count: transactions.len(),
        transactions,
    }))
}

pub async fn categories(
    State(state): State<SharedState>,
    Path(account_type): Path<String>,
) -> Result<Json<Value>, AppError> {
    let account_type: AccountType = account_type.parse().map_err(AppError::BadRequest)?;
    let categories = tally_ingest::categories_for(state.store(), account_type).await?;
    Ok(Json(json!({
        "account_type": account_type,
        "categories": categories,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PatternRequest {
    pattern: String,
    category: String,
}

#[derive(Serialize)]
pub struct PatternResponse {
    created: bool,
    pattern: KnownPattern,
}

pub async fn add_pattern(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<(StatusCode, Json<PatternResponse>), AppError> {
    let request: PatternRequest = json_body(&body)?;
    let outcome = tally_ingest::promote_pattern(
        state.store(),
        state.pipeline.pattern_cache(),
        &request.pattern,
        &request.category,
    )
    .await?;

    match outcome {
        PromoteOutcome::Created(pattern) => Ok((
            StatusCode::CREATED,
            Json(PatternResponse {
                created: true,
                pattern,
            }),
        )),
        PromoteOutcome::AlreadyExists(pattern) => Ok((
            StatusCode::OK,
            Json(PatternResponse {
                created: false,
                pattern,
            }),
        )),
        PromoteOutcome::Blank => Err(AppError::BadRequest("Pattern required".to_string())),
    }
}

pub async fn refresh_patterns(State(state): State<SharedState>) -> Json<Value> {
    state.pipeline.refresh_patterns().await;
    Json(json!({
        "success": true,
        "message": "Known pattern cache cleared",
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// `MM/YYYY`; the current month when absent.
    month: Option<String>,
}

pub async fn category_report(
    State(state): State<SharedState>,
    Path(category): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<CategorySummary>, AppError> {
    let month = match query.month {
        Some(m) => m
            .parse::<MonthKey>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => MonthKey::of(Local::now().date_naive()),
    };
    Ok(Json(
        tally_ingest::category_summary(state.store(), &category, month).await?,
    ))
}
