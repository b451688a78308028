use async_trait::async_trait;
use std::collections::HashMap;
use tally_core::{
    AccountType, KnownPattern, Money, NaturalKey, NewPattern, NewTransaction, Transaction,
};
use tokio::sync::Mutex;

use crate::store::{StoreError, TransactionFilter, TransactionPatch, TransactionStore};

#[derive(Default)]
struct MemoryState {
    transactions: Vec<Transaction>,
    patterns: Vec<KnownPattern>,
    category_mapping: Vec<(String, AccountType)>,
    budgets: HashMap<String, Money>,
    /// Natural key of each folded occurrence → aggregate row id.
    merged: HashMap<NaturalKey, i64>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store with the same semantics as [`crate::SqliteStore`].
/// Used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_category_mapping(&self, category: &str, account_type: AccountType) {
        let mut state = self.state.lock().await;
        state
            .category_mapping
            .push((category.to_string(), account_type));
    }

    pub async fn set_budget(&self, category: &str, amount: Money) {
        let mut state = self.state.lock().await;
        state.budgets.insert(category.to_string(), amount);
    }

    /// Every stored transaction in insertion order.
    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().await.transactions.clone()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert(&self, tx: &NewTransaction) -> Result<Transaction, StoreError> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let stored = Transaction::from_new(id, tx.clone());
        state.transactions.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: i64, patch: &TransactionPatch) -> Result<Transaction, StoreError> {
        let mut state = self.state.lock().await;
        let tx = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        patch.apply(tx);
        Ok(tx.clone())
    }

    async fn merge_into(
        &self,
        id: i64,
        key: &NaturalKey,
        amount: Money,
    ) -> Result<Transaction, StoreError> {
        let mut state = self.state.lock().await;
        let tx = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))?;
        tx.transfer_amount += amount;
        let merged = tx.clone();
        state.merged.entry(key.clone()).or_insert(id);
        Ok(merged)
    }

    async fn record_merged(&self, key: &NaturalKey, aggregate_id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.merged.entry(key.clone()).or_insert(aggregate_id);
        Ok(())
    }

    async fn is_merged(&self, key: &NaturalKey) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.merged.contains_key(key))
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = self.state.lock().await;
        let mut matched: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.transaction_date
                .cmp(&a.transaction_date)
                .then(b.id.cmp(&a.id))
        });
        if let Some(limit) = limit {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }

    async fn list_patterns(&self) -> Result<Vec<KnownPattern>, StoreError> {
        Ok(self.state.lock().await.patterns.clone())
    }

    async fn insert_pattern(&self, pattern: &NewPattern) -> Result<KnownPattern, StoreError> {
        let mut state = self.state.lock().await;
        let stored = KnownPattern {
            id: state.next_id(),
            receiver_pattern: pattern.receiver_pattern.clone(),
            category: pattern.category.clone(),
            new_content: pattern.new_content.clone(),
        };
        state.patterns.push(stored.clone());
        Ok(stored)
    }

    async fn find_pattern(
        &self,
        receiver_pattern: &str,
    ) -> Result<Option<KnownPattern>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .patterns
            .iter()
            .find(|p| p.receiver_pattern == receiver_pattern)
            .cloned())
    }

    async fn categories_for_type(
        &self,
        account_type: AccountType,
    ) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .category_mapping
            .iter()
            .filter(|(_, t)| *t == account_type)
            .map(|(c, _)| c.clone())
            .collect())
    }

    async fn budget_for(&self, category: &str) -> Result<Option<Money>, StoreError> {
        Ok(self.state.lock().await.budgets.get(category).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{TransferType, UNCATEGORIZED};

    fn new_tx(day: u32, content: &str) -> NewTransaction {
        NewTransaction {
            account: "MB".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2025, 10, day)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            account_number: "9876543210".to_string(),
            code: None,
            reference_code: None,
            content: content.to_string(),
            source_content: content.to_string(),
            transfer_type: TransferType::Out,
            transfer_amount: Money::from_dong(150_000),
            accumulated: Some(Money::zero()),
            description: None,
            receiver: None,
            category: UNCATEGORIZED.to_string(),
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let store = MemoryStore::new();
        let a = store.insert(&new_tx(1, "a")).await.unwrap();
        let b = store.insert(&new_tx(2, "b")).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(a.accumulated, Some(Money::zero()));
    }

    #[tokio::test]
    async fn list_is_newest_first_with_limit() {
        let store = MemoryStore::new();
        store.insert(&new_tx(5, "mid")).await.unwrap();
        store.insert(&new_tx(9, "late")).await.unwrap();
        store.insert(&new_tx(1, "early")).await.unwrap();

        let recent = store
            .list_transactions(&TransactionFilter::default(), Some(2))
            .await
            .unwrap();
        let contents: Vec<_> = recent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["late", "mid"]);
    }

    #[tokio::test]
    async fn merge_adds_amount_and_remembers_key() {
        let store = MemoryStore::new();
        let row = store.insert(&new_tx(1, "Bank fees 10/2025")).await.unwrap();
        let folded = new_tx(3, "Phi SMS").natural_key();
        assert!(!store.is_merged(&folded).await.unwrap());

        let merged = store
            .merge_into(row.id, &folded, Money::from_dong(1_100))
            .await
            .unwrap();
        assert_eq!(merged.transfer_amount, Money::from_dong(151_100));
        assert!(store.is_merged(&folded).await.unwrap());
        assert_eq!(store.transactions().await.len(), 1);

        let err = store
            .merge_into(99, &new_tx(4, "Phi SMS").natural_key(), Money::from_dong(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(99)));
        assert!(!store.is_merged(&new_tx(4, "Phi SMS").natural_key()).await.unwrap());
    }

    #[tokio::test]
    async fn update_unknown_id_fails() {
        let store = MemoryStore::new();
        let err = store
            .update(42, &TransactionPatch::category("Fun"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }
}
