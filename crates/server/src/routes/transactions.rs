use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tally_core::Transaction;
use tally_ingest::TransactionStats;
use tally_storage::{TransactionFilter, TransactionStore};

use super::json_body;
use crate::error::AppError;
use crate::state::SharedState;

const DEFAULT_RECENT: u32 = 10;

#[derive(Serialize)]
pub struct TransactionList {
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    count: usize,
    transactions: Vec<Transaction>,
}

impl TransactionList {
    fn new(transactions: Vec<Transaction>) -> Self {
        TransactionList {
            account: None,
            category: None,
            count: transactions.len(),
            transactions,
        }
    }
}

pub async fn stats(State(state): State<SharedState>) -> Result<Json<TransactionStats>, AppError> {
    Ok(Json(tally_ingest::stats(state.store()).await?))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    limit: Option<u32>,
}

pub async fn recent(
    State(state): State<SharedState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<TransactionList>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT);
    let transactions = state
        .store()
        .list_transactions(&TransactionFilter::default(), Some(limit))
        .await?;
    Ok(Json(TransactionList::new(transactions)))
}

pub async fn by_account(
    State(state): State<SharedState>,
    Path(account): Path<String>,
) -> Result<Json<TransactionList>, AppError> {
    let transactions = state
        .store()
        .list_transactions(&TransactionFilter::account(&account), None)
        .await?;
    Ok(Json(TransactionList {
        account: Some(account),
        ..TransactionList::new(transactions)
    }))
}

pub async fn by_category(
    State(state): State<SharedState>,
    Path(category): Path<String>,
) -> Result<Json<TransactionList>, AppError> {
    let transactions = state
        .store()
        .list_transactions(&TransactionFilter::category(&category), None)
        .await?;
    Ok(Json(TransactionList {
        category: Some(category),
        ..TransactionList::new(transactions)
    }))
}

#[derive(Debug, Deserialize)]
pub struct CategoryUpdate {
    category: String,
}

pub async fn set_category(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<Transaction>, AppError> {
    let update: CategoryUpdate = json_body(&body)?;
    let category = update.category.trim();
    if category.is_empty() {
        return Err(AppError::BadRequest("Category required".to_string()));
    }
    Ok(Json(tally_ingest::categorize(state.store(), id, category).await?))
}
