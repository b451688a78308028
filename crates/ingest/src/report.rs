//! Read-only summaries over stored transactions.

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tally_core::{Money, MonthKey, TransferType};
use tally_storage::{StoreError, TransactionFilter, TransactionStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionStats {
    #[serde(rename = "total_transactions")]
    pub total: usize,
    pub by_account: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub uncategorized: usize,
    pub categorized: usize,
}

pub async fn stats<S>(store: &S) -> Result<TransactionStats, StoreError>
where
    S: TransactionStore + ?Sized,
{
    let transactions = store
        .list_transactions(&TransactionFilter::default(), None)
        .await?;

    let mut stats = TransactionStats {
        total: transactions.len(),
        ..Default::default()
    };
    for tx in &transactions {
        *stats.by_account.entry(tx.account.clone()).or_default() += 1;
        *stats.by_category.entry(tx.category.clone()).or_default() += 1;
        if tx.is_uncategorized() {
            stats.uncategorized += 1;
        }
    }
    stats.categorized = stats.total - stats.uncategorized;
    Ok(stats)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    pub id: i64,
    pub date: NaiveDateTime,
    pub amount: Money,
    pub content: String,
}

/// One category's spending for a month against its budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub month: MonthKey,
    pub budget: Option<Money>,
    pub spent: Money,
    /// Only with a positive budget. Negative when overspent.
    pub remaining: Option<Money>,
    /// Percentage of the budget spent, one decimal place.
    pub percent_used: Option<f64>,
    /// Outgoing transactions, newest first.
    pub expenses: Vec<Expense>,
}

pub async fn category_summary<S>(
    store: &S,
    category: &str,
    month: MonthKey,
) -> Result<CategorySummary, StoreError>
where
    S: TransactionStore + ?Sized,
{
    let rows = store
        .list_transactions(&TransactionFilter::category(category).within(month), None)
        .await?;
    let expenses: Vec<Expense> = rows
        .into_iter()
        .filter(|t| t.transfer_type == TransferType::Out)
        .map(|t| Expense {
            id: t.id,
            date: t.transaction_date,
            amount: t.transfer_amount,
            content: t.content,
        })
        .collect();
    let spent: Money = expenses.iter().map(|e| e.amount).sum();

    let budget = store.budget_for(category).await?;
    let (remaining, percent_used) = match budget.filter(|b| b.as_decimal() > Decimal::ZERO) {
        Some(b) => {
            let percent = (spent.as_decimal() * Decimal::ONE_HUNDRED / b.as_decimal()).round_dp(1);
            (Some(b - spent), percent.to_f64())
        }
        None => (None, None),
    };

    Ok(CategorySummary {
        category: category.to_string(),
        month,
        budget,
        spent,
        remaining,
        percent_used,
        expenses,
    })
}
