//! The persistence gateway: the only seam between the ingest pipeline and a
//! backing store.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tally_core::{
    AccountType, KnownPattern, Money, MonthKey, NaturalKey, NewPattern, NewTransaction,
    Transaction, UNCATEGORIZED,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Transaction not found: {0}")]
    NotFound(i64),
    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Partial update for a stored transaction. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub category: Option<String>,
    pub content: Option<String>,
    /// Added to the stored amount in a single store-side operation.
    pub add_amount: Option<Money>,
}

impl TransactionPatch {
    pub fn category(category: &str) -> Self {
        TransactionPatch {
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    pub fn increment(amount: Money) -> Self {
        TransactionPatch {
            add_amount: Some(amount),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.content.is_none() && self.add_amount.is_none()
    }

    pub fn apply(&self, tx: &mut Transaction) {
        if let Some(category) = &self.category {
            tx.category = category.clone();
        }
        if let Some(content) = &self.content {
            tx.content = content.clone();
        }
        if let Some(delta) = self.add_amount {
            tx.transfer_amount += delta;
        }
    }
}

/// Equality and range constraints on stored transactions. Every field is
/// optional; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub transaction_date: Option<NaiveDateTime>,
    pub transfer_amount: Option<Money>,
    pub account_number: Option<String>,
    pub content: Option<String>,
    /// Matches the content as originally received.
    pub source_content: Option<String>,
    pub account: Option<String>,
    pub category: Option<String>,
    /// Inclusive lower bound on `transaction_date`.
    pub from: Option<NaiveDateTime>,
    /// Exclusive upper bound on `transaction_date`.
    pub until: Option<NaiveDateTime>,
}

impl TransactionFilter {
    pub fn natural_key(key: &NaturalKey) -> Self {
        TransactionFilter {
            transaction_date: Some(key.transaction_date),
            transfer_amount: Some(key.transfer_amount),
            account_number: Some(key.account_number.clone()),
            source_content: Some(key.content.clone()),
            ..Default::default()
        }
    }

    pub fn content(content: &str) -> Self {
        TransactionFilter {
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    pub fn account(account: &str) -> Self {
        TransactionFilter {
            account: Some(account.to_string()),
            ..Default::default()
        }
    }

    pub fn category(category: &str) -> Self {
        TransactionFilter {
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    pub fn uncategorized() -> Self {
        Self::category(UNCATEGORIZED)
    }

    pub fn within(mut self, month: MonthKey) -> Self {
        self.from = Some(month.start());
        self.until = Some(month.end());
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        fn eq<T: PartialEq>(want: &Option<T>, got: &T) -> bool {
            want.as_ref().is_none_or(|w| w == got)
        }

        eq(&self.transaction_date, &tx.transaction_date)
            && eq(&self.transfer_amount, &tx.transfer_amount)
            && eq(&self.account_number, &tx.account_number)
            && eq(&self.content, &tx.content)
            && eq(&self.source_content, &tx.source_content)
            && eq(&self.account, &tx.account)
            && eq(&self.category, &tx.category)
            && self.from.is_none_or(|from| tx.transaction_date >= from)
            && self.until.is_none_or(|until| tx.transaction_date < until)
    }
}

/// Store operations used by the pipeline, the review workflow and reports.
///
/// No transactional wrapping is assumed across calls. Callers doing
/// read-then-write sequences accept that concurrent writers may interleave.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, tx: &NewTransaction) -> Result<Transaction, StoreError>;

    async fn update(&self, id: i64, patch: &TransactionPatch) -> Result<Transaction, StoreError>;

    /// Adds `amount` to aggregate row `id` and records `key` as folded into
    /// it, as one unit: either both happen or neither does.
    async fn merge_into(
        &self,
        id: i64,
        key: &NaturalKey,
        amount: Money,
    ) -> Result<Transaction, StoreError>;

    /// Records `key` as folded into aggregate row `aggregate_id` without
    /// touching the row.
    async fn record_merged(&self, key: &NaturalKey, aggregate_id: i64) -> Result<(), StoreError>;

    /// Whether an occurrence with this key was folded into an aggregate.
    /// Folded occurrences leave no transaction row behind, only their key.
    async fn is_merged(&self, key: &NaturalKey) -> Result<bool, StoreError>;

    /// Newest first (`transaction_date` descending, then highest id).
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// The most recent transaction matching `filter`, if any.
    async fn find_matching(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .list_transactions(filter, Some(1))
            .await?
            .into_iter()
            .next())
    }

    /// All known patterns in store order (insertion order).
    async fn list_patterns(&self) -> Result<Vec<KnownPattern>, StoreError>;

    async fn insert_pattern(&self, pattern: &NewPattern) -> Result<KnownPattern, StoreError>;

    async fn find_pattern(&self, receiver_pattern: &str)
        -> Result<Option<KnownPattern>, StoreError>;

    /// Categories configured for an account type in `category_mapping`.
    async fn categories_for_type(
        &self,
        account_type: AccountType,
    ) -> Result<Vec<String>, StoreError>;

    /// Monthly budget for a category from `budget_plans`.
    async fn budget_for(&self, category: &str) -> Result<Option<Money>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::TransferType;

    fn stored(day: u32, content: &str, category: &str) -> Transaction {
        Transaction {
            id: day as i64,
            account: "VCB".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2025, 10, day)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            account_number: "0123".to_string(),
            code: None,
            reference_code: None,
            content: content.to_string(),
            source_content: content.to_string(),
            transfer_type: TransferType::Out,
            transfer_amount: Money::from_dong(10_000),
            accumulated: None,
            description: None,
            category: category.to_string(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(TransactionFilter::default().matches(&stored(1, "x", "Food")));
    }

    #[test]
    fn natural_key_filter_requires_all_fields() {
        let tx = stored(3, "grab", "Transport");
        let key = NaturalKey {
            transaction_date: tx.transaction_date,
            transfer_amount: tx.transfer_amount,
            account_number: tx.account_number.clone(),
            content: "grab".to_string(),
        };
        assert!(TransactionFilter::natural_key(&key).matches(&tx));

        let other = NaturalKey {
            content: "grab bike".to_string(),
            ..key
        };
        assert!(!TransactionFilter::natural_key(&other).matches(&tx));
    }

    #[test]
    fn natural_key_filter_sees_through_rewrites() {
        let mut tx = stored(4, "grab", "Transport");
        tx.content = "Grab ride".to_string();
        let key = NaturalKey {
            transaction_date: tx.transaction_date,
            transfer_amount: tx.transfer_amount,
            account_number: tx.account_number.clone(),
            content: "grab".to_string(),
        };
        assert!(TransactionFilter::natural_key(&key).matches(&tx));
        assert!(!TransactionFilter::content("grab").matches(&tx));
    }

    #[test]
    fn month_window_is_half_open() {
        let oct = MonthKey::new(2025, 10).unwrap();
        let filter = TransactionFilter::category("Food").within(oct);
        assert!(filter.matches(&stored(1, "pho", "Food")));
        assert!(!filter.matches(&stored(1, "pho", "Fun")));

        let sep = MonthKey::new(2025, 9).unwrap();
        assert!(!TransactionFilter::default().within(sep).matches(&stored(1, "pho", "Food")));
    }

    #[test]
    fn patch_applies_increment_and_overrides() {
        let mut tx = stored(2, "fee", "Bank Fee");
        TransactionPatch::increment(Money::from_dong(1_100)).apply(&mut tx);
        assert_eq!(tx.transfer_amount, Money::from_dong(11_100));

        TransactionPatch::category("Need").apply(&mut tx);
        assert_eq!(tx.category, "Need");
        assert_eq!(tx.content, "fee");
        assert!(TransactionPatch::default().is_empty());
    }
}
