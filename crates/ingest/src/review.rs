//! Manual review of uncategorized transactions, and promotion of a reviewed
//! transaction's text into a new known pattern.

use tally_core::{AccountType, KnownPattern, NewPattern, Transaction};
use tally_storage::{StoreError, TransactionFilter, TransactionPatch, TransactionStore};

use crate::matcher::PatternCache;

/// Batch size used by the interactive reviewer.
pub const REVIEW_BATCH: u32 = 50;

const MIN_PATTERN_CHARS: usize = 3;

/// Uncategorized transactions, newest first.
pub async fn pending_review<S>(store: &S, limit: u32) -> Result<Vec<Transaction>, StoreError>
where
    S: TransactionStore + ?Sized,
{
    store
        .list_transactions(&TransactionFilter::uncategorized(), Some(limit))
        .await
}

/// Categories offered for an account type. With no mapping configured the
/// account type itself is the only choice.
pub async fn categories_for<S>(
    store: &S,
    account_type: AccountType,
) -> Result<Vec<String>, StoreError>
where
    S: TransactionStore + ?Sized,
{
    let categories = store.categories_for_type(account_type).await?;
    if categories.is_empty() {
        return Ok(vec![account_type.to_string()]);
    }
    Ok(categories)
}

pub async fn categorize<S>(store: &S, id: i64, category: &str) -> Result<Transaction, StoreError>
where
    S: TransactionStore + ?Sized,
{
    let updated = store.update(id, &TransactionPatch::category(category)).await?;
    tracing::info!(id, category, "transaction categorized");
    Ok(updated)
}

/// Lowercased first word of `content`, if long enough to be a useful pattern.
pub fn suggest_pattern(content: &str) -> Option<String> {
    let word = content.split_whitespace().next()?.to_lowercase();
    (word.chars().count() >= MIN_PATTERN_CHARS).then_some(word)
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromoteOutcome {
    Created(KnownPattern),
    AlreadyExists(KnownPattern),
    /// The pattern was empty after trimming; nothing was stored.
    Blank,
}

/// Store `pattern → category` unless that pattern text is already known.
/// A new pattern clears `cache` so it takes effect on the next event.
pub async fn promote_pattern<S>(
    store: &S,
    cache: &PatternCache,
    pattern: &str,
    category: &str,
) -> Result<PromoteOutcome, StoreError>
where
    S: TransactionStore + ?Sized,
{
    let candidate = NewPattern::new(pattern, category);
    if candidate.receiver_pattern.is_empty() {
        return Ok(PromoteOutcome::Blank);
    }

    if let Some(existing) = store.find_pattern(&candidate.receiver_pattern).await? {
        tracing::debug!(pattern = %existing.receiver_pattern, "pattern already known");
        return Ok(PromoteOutcome::AlreadyExists(existing));
    }

    let created = store.insert_pattern(&candidate).await?;
    tracing::info!(
        pattern = %created.receiver_pattern,
        category = %created.category,
        "known pattern added"
    );
    cache.invalidate().await;
    Ok(PromoteOutcome::Created(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;
    use tally_core::{Money, NewTransaction, TransferType, UNCATEGORIZED};
    use tally_storage::MemoryStore;

    fn tx(day: u32, content: &str) -> NewTransaction {
        NewTransaction {
            account: "VCB".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2025, 10, day)
                .unwrap()
                .and_hms_opt(18, 0, 0)
                .unwrap(),
            account_number: "0123499999".to_string(),
            code: None,
            reference_code: None,
            content: content.to_string(),
            source_content: content.to_string(),
            transfer_type: TransferType::Out,
            transfer_amount: Money::from_dong(120_000),
            accumulated: None,
            description: None,
            receiver: None,
            category: UNCATEGORIZED.to_string(),
        }
    }

    #[tokio::test]
    async fn pending_lists_only_uncategorized_newest_first() {
        let store = MemoryStore::new();
        store.insert(&tx(1, "old")).await.unwrap();
        let done = store.insert(&tx(2, "done")).await.unwrap();
        store.insert(&tx(3, "new")).await.unwrap();
        categorize(&store, done.id, "Food").await.unwrap();

        let pending = pending_review(&store, REVIEW_BATCH).await.unwrap();
        let contents: Vec<_> = pending.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["new", "old"]);

        assert_eq!(pending_review(&store, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn categories_fall_back_to_account_type() {
        let store = MemoryStore::new();
        store.add_category_mapping("Groceries", AccountType::Need).await;
        store.add_category_mapping("Rent", AccountType::Need).await;

        assert_eq!(
            categories_for(&store, AccountType::Need).await.unwrap(),
            ["Groceries", "Rent"]
        );
        assert_eq!(categories_for(&store, AccountType::Invest).await.unwrap(), ["Invest"]);
    }

    #[test]
    fn suggestion_is_first_word() {
        assert_eq!(suggest_pattern("GRAB*Ride 0812").as_deref(), Some("grab*ride"));
        assert_eq!(suggest_pattern("  Shopee order").as_deref(), Some("shopee"));
        assert_eq!(suggest_pattern("TT hoa don"), None);
        assert_eq!(suggest_pattern(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn promote_inserts_once_and_clears_cache() {
        let store = MemoryStore::new();
        let cache = PatternCache::new(Duration::from_secs(300));
        assert!(cache.get_or_refresh(&store).await.unwrap().is_empty());

        let first = promote_pattern(&store, &cache, " Highlands ", "Fun").await.unwrap();
        let PromoteOutcome::Created(created) = first else {
            panic!("expected a new pattern, got {first:?}");
        };
        assert_eq!(created.receiver_pattern, "highlands");
        assert_eq!(cache.get_or_refresh(&store).await.unwrap().len(), 1);

        let again = promote_pattern(&store, &cache, "highlands", "Food").await.unwrap();
        assert!(matches!(again, PromoteOutcome::AlreadyExists(ref p) if p.category == "Fun"));
        assert_eq!(store.list_patterns().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_pattern_is_not_stored() {
        let store = MemoryStore::new();
        let cache = PatternCache::new(Duration::from_secs(300));
        assert_eq!(
            promote_pattern(&store, &cache, "   ", "Fun").await.unwrap(),
            PromoteOutcome::Blank
        );
        assert!(store.list_patterns().await.unwrap().is_empty());
    }
}
