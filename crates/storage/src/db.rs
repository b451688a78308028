use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{sqlite::SqlitePoolOptions, Pool, QueryBuilder, Sqlite};
use std::path::Path;
use tally_core::{
    AccountType, KnownPattern, Money, NaturalKey, NewPattern, NewTransaction, Transaction,
    TransferType,
};

use crate::store::{StoreError, TransactionFilter, TransactionPatch, TransactionStore};

pub type DbPool = Pool<Sqlite>;

const TRANSACTION_COLUMNS: &str = "id, account, transaction_date, account_number, code, \
    reference_code, content, source_content, transfer_type, transfer_amount, accumulated, \
    description, category";

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    account: String,
    transaction_date: NaiveDateTime,
    account_number: String,
    code: Option<String>,
    reference_code: Option<String>,
    content: String,
    source_content: String,
    transfer_type: String,
    transfer_amount: i64,
    accumulated: Option<i64>,
    description: Option<String>,
    category: String,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(r: TransactionRow) -> Result<Self, Self::Error> {
        let transfer_type: TransferType = r
            .transfer_type
            .parse()
            .map_err(|reason| StoreError::Corrupt { id: r.id, reason })?;
        Ok(Transaction {
            id: r.id,
            account: r.account,
            transaction_date: r.transaction_date,
            account_number: r.account_number,
            code: r.code,
            reference_code: r.reference_code,
            content: r.content,
            source_content: r.source_content,
            transfer_type,
            transfer_amount: Money::from_dong(r.transfer_amount),
            accumulated: r.accumulated.map(Money::from_dong),
            description: r.description,
            category: r.category,
        })
    }
}

type PatternRow = (i64, String, String, Option<String>);

fn pattern_from_row(r: PatternRow) -> KnownPattern {
    KnownPattern {
        id: r.0,
        receiver_pattern: r.1,
        category: r.2,
        new_content: r.3,
    }
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&format!("sqlite:{}?mode=rwc", path.display()))
            .await?;

        for pragma in [
            "PRAGMA journal_mode = WAL",
            "PRAGMA synchronous = NORMAL",
            "PRAGMA busy_timeout = 5000",
            "PRAGMA cache_size = -32000",
        ] {
            sqlx::query(pragma).execute(&pool).await?;
        }

        run_migrations(&pool).await?;
        tracing::debug!(path = %path.display(), "opened transaction store");

        Ok(SqliteStore { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Rows in `category_mapping` and `budget_plans` belong to the reporting
    /// side; these exist for seeding and tests.
    pub async fn add_category_mapping(
        &self,
        category: &str,
        account_type: AccountType,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO category_mapping (category, account_type) VALUES (?, ?)")
            .bind(category)
            .bind(account_type.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_budget(&self, category: &str, amount: Money) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO budget_plans (category, budget_amount) VALUES (?, ?) \
             ON CONFLICT(category) DO UPDATE SET budget_amount = excluded.budget_amount",
        )
        .bind(category)
        .bind(amount.to_dong())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account TEXT NOT NULL,
            transaction_date TEXT NOT NULL,
            account_number TEXT NOT NULL DEFAULT '',
            code TEXT,
            reference_code TEXT,
            content TEXT NOT NULL DEFAULT '',
            source_content TEXT NOT NULL DEFAULT '',
            transfer_type TEXT NOT NULL CHECK (transfer_type IN ('in', 'out')),
            transfer_amount INTEGER NOT NULL,
            accumulated INTEGER,
            description TEXT,
            category TEXT NOT NULL DEFAULT 'Uncategorized',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_natural_key \
         ON transactions (transaction_date, transfer_amount, account_number, source_content)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_content ON transactions (content)")
        .execute(pool)
        .await?;

    // Occurrences folded into an aggregate row keep only their natural key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS merged_occurrences (
            transaction_date TEXT NOT NULL,
            transfer_amount INTEGER NOT NULL,
            account_number TEXT NOT NULL,
            source_content TEXT NOT NULL,
            aggregate_id INTEGER NOT NULL REFERENCES transactions (id),
            PRIMARY KEY (transaction_date, transfer_amount, account_number, source_content)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS known_receivers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            receiver_pattern TEXT NOT NULL,
            category TEXT NOT NULL,
            new_content TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_mapping (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            account_type TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS budget_plans (
            category TEXT PRIMARY KEY,
            budget_amount INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn insert_merged<'e, E>(
    executor: E,
    key: &NaturalKey,
    aggregate_id: i64,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR IGNORE INTO merged_occurrences \
         (transaction_date, transfer_amount, account_number, source_content, aggregate_id) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(key.transaction_date)
    .bind(key.transfer_amount.to_dong())
    .bind(&key.account_number)
    .bind(&key.content)
    .bind(aggregate_id)
    .execute(executor)
    .await?;
    Ok(())
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &TransactionFilter) {
    if let Some(date) = filter.transaction_date {
        qb.push(" AND transaction_date = ").push_bind(date);
    }
    if let Some(amount) = filter.transfer_amount {
        qb.push(" AND transfer_amount = ").push_bind(amount.to_dong());
    }
    if let Some(number) = &filter.account_number {
        qb.push(" AND account_number = ").push_bind(number.clone());
    }
    if let Some(content) = &filter.content {
        qb.push(" AND content = ").push_bind(content.clone());
    }
    if let Some(content) = &filter.source_content {
        qb.push(" AND source_content = ").push_bind(content.clone());
    }
    if let Some(account) = &filter.account {
        qb.push(" AND account = ").push_bind(account.clone());
    }
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(from) = filter.from {
        qb.push(" AND transaction_date >= ").push_bind(from);
    }
    if let Some(until) = filter.until {
        qb.push(" AND transaction_date < ").push_bind(until);
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn insert(&self, tx: &NewTransaction) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "INSERT INTO transactions (account, transaction_date, account_number, code, \
             reference_code, content, source_content, transfer_type, transfer_amount, \
             accumulated, description, category) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(&tx.account)
        .bind(tx.transaction_date)
        .bind(&tx.account_number)
        .bind(&tx.code)
        .bind(&tx.reference_code)
        .bind(&tx.content)
        .bind(&tx.source_content)
        .bind(tx.transfer_type.as_str())
        .bind(tx.transfer_amount.to_dong())
        .bind(tx.accumulated.map(Money::to_dong))
        .bind(&tx.description)
        .bind(&tx.category)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update(&self, id: i64, patch: &TransactionPatch) -> Result<Transaction, StoreError> {
        if patch.is_empty() {
            let row = sqlx::query_as::<_, TransactionRow>(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            return row.ok_or(StoreError::NotFound(id))?.try_into();
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE transactions SET ");
        let mut set = qb.separated(", ");
        if let Some(category) = &patch.category {
            set.push("category = ").push_bind_unseparated(category.clone());
        }
        if let Some(content) = &patch.content {
            set.push("content = ").push_bind_unseparated(content.clone());
        }
        if let Some(delta) = patch.add_amount {
            set.push("transfer_amount = transfer_amount + ")
                .push_bind_unseparated(delta.to_dong());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(TRANSACTION_COLUMNS);

        let row = qb
            .build_query_as::<TransactionRow>()
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound(id))?.try_into()
    }

    async fn merge_into(
        &self,
        id: i64,
        key: &NaturalKey,
        amount: Money,
    ) -> Result<Transaction, StoreError> {
        let mut db_tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE transactions SET transfer_amount = transfer_amount + ? WHERE id = ? \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(amount.to_dong())
        .bind(id)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        insert_merged(&mut *db_tx, key, id).await?;
        db_tx.commit().await?;
        row.try_into()
    }

    async fn record_merged(&self, key: &NaturalKey, aggregate_id: i64) -> Result<(), StoreError> {
        insert_merged(&self.pool, key, aggregate_id).await?;
        Ok(())
    }

    async fn is_merged(&self, key: &NaturalKey) -> Result<bool, StoreError> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT 1 FROM merged_occurrences WHERE transaction_date = ? \
             AND transfer_amount = ? AND account_number = ? AND source_content = ? LIMIT 1",
        )
        .bind(key.transaction_date)
        .bind(key.transfer_amount.to_dong())
        .bind(&key.account_number)
        .bind(&key.content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        limit: Option<u32>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1 = 1"
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY transaction_date DESC, id DESC");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = qb
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn list_patterns(&self) -> Result<Vec<KnownPattern>, StoreError> {
        let rows = sqlx::query_as::<_, PatternRow>(
            "SELECT id, receiver_pattern, category, new_content FROM known_receivers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(pattern_from_row).collect())
    }

    async fn insert_pattern(&self, pattern: &NewPattern) -> Result<KnownPattern, StoreError> {
        let row = sqlx::query_as::<_, PatternRow>(
            "INSERT INTO known_receivers (receiver_pattern, category, new_content) \
             VALUES (?, ?, ?) RETURNING id, receiver_pattern, category, new_content",
        )
        .bind(&pattern.receiver_pattern)
        .bind(&pattern.category)
        .bind(&pattern.new_content)
        .fetch_one(&self.pool)
        .await?;
        Ok(pattern_from_row(row))
    }

    async fn find_pattern(
        &self,
        receiver_pattern: &str,
    ) -> Result<Option<KnownPattern>, StoreError> {
        let row = sqlx::query_as::<_, PatternRow>(
            "SELECT id, receiver_pattern, category, new_content FROM known_receivers \
             WHERE receiver_pattern = ? ORDER BY id LIMIT 1",
        )
        .bind(receiver_pattern)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(pattern_from_row))
    }

    async fn categories_for_type(
        &self,
        account_type: AccountType,
    ) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT category FROM category_mapping WHERE account_type = ? ORDER BY id",
        )
        .bind(account_type.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn budget_for(&self, category: &str) -> Result<Option<Money>, StoreError> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT budget_amount FROM budget_plans WHERE category = ?",
        )
        .bind(category)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Money::from_dong(r.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{MonthKey, UNCATEGORIZED};

    async fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("tally.db")).await.unwrap();
        (dir, store)
    }

    fn new_tx(day: u32, content: &str, amount: i64) -> NewTransaction {
        NewTransaction {
            account: "VCB".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2025, 10, day)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            account_number: "0123499999".to_string(),
            code: None,
            reference_code: Some("REF1".to_string()),
            content: content.to_string(),
            source_content: content.to_string(),
            transfer_type: TransferType::Out,
            transfer_amount: Money::from_dong(amount),
            accumulated: None,
            description: Some(content.to_string()),
            receiver: Some("not persisted".to_string()),
            category: UNCATEGORIZED.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_returns_stored_row() {
        let (_dir, store) = open_temp().await;
        let tx = store.insert(&new_tx(1, "pho bo", 45_000)).await.unwrap();
        assert!(tx.id > 0);
        assert_eq!(tx.transfer_amount, Money::from_dong(45_000));
        assert_eq!(tx.transfer_type, TransferType::Out);
        assert_eq!(tx.accumulated, None);
        assert_eq!(tx.reference_code.as_deref(), Some("REF1"));
        assert_eq!(tx.category, UNCATEGORIZED);
    }

    #[tokio::test]
    async fn find_matching_on_natural_key() {
        let (_dir, store) = open_temp().await;
        let candidate = new_tx(2, "grab", 30_000);
        store.insert(&candidate).await.unwrap();

        let hit = store
            .find_matching(&TransactionFilter::natural_key(&candidate.natural_key()))
            .await
            .unwrap();
        assert!(hit.is_some());

        let mut other = candidate.clone();
        other.transfer_amount = Money::from_dong(30_001);
        let miss = store
            .find_matching(&TransactionFilter::natural_key(&other.natural_key()))
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn natural_key_matches_rewritten_row() {
        let (_dir, store) = open_temp().await;
        let mut candidate = new_tx(2, "TT SHOPEE 8812", 250_000);
        let key = candidate.natural_key();
        candidate.content = "Shopee order".to_string();
        let stored = store.insert(&candidate).await.unwrap();
        assert_eq!(stored.source_content, "TT SHOPEE 8812");

        let hit = store
            .find_matching(&TransactionFilter::natural_key(&key))
            .await
            .unwrap();
        assert_eq!(hit.map(|t| t.id), Some(stored.id));
    }

    #[tokio::test]
    async fn find_matching_prefers_most_recent() {
        let (_dir, store) = open_temp().await;
        store.insert(&new_tx(3, "Bank fees 10/2025", 1_000)).await.unwrap();
        let later = store.insert(&new_tx(9, "Bank fees 10/2025", 2_000)).await.unwrap();

        let hit = store
            .find_matching(&TransactionFilter::content("Bank fees 10/2025"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, later.id);
    }

    #[tokio::test]
    async fn update_increments_amount_in_place() {
        let (_dir, store) = open_temp().await;
        let tx = store.insert(&new_tx(4, "fee", 1_100)).await.unwrap();

        let updated = store
            .update(tx.id, &TransactionPatch::increment(Money::from_dong(2_200)))
            .await
            .unwrap();
        assert_eq!(updated.transfer_amount, Money::from_dong(3_300));
        assert_eq!(updated.content, "fee");
    }

    #[tokio::test]
    async fn merge_increments_and_records_key_together() {
        let (_dir, store) = open_temp().await;
        let row = store.insert(&new_tx(2, "Bank fees 10/2025", 1_100)).await.unwrap();
        store
            .record_merged(&new_tx(2, "Phi SMS", 1_100).natural_key(), row.id)
            .await
            .unwrap();

        let second = new_tx(20, "Phi duy tri", 2_200).natural_key();
        assert!(!store.is_merged(&second).await.unwrap());
        let merged = store
            .merge_into(row.id, &second, Money::from_dong(2_200))
            .await
            .unwrap();
        assert_eq!(merged.transfer_amount, Money::from_dong(3_300));
        assert!(store.is_merged(&second).await.unwrap());
        assert!(store
            .is_merged(&new_tx(2, "Phi SMS", 1_100).natural_key())
            .await
            .unwrap());

        // Nothing is recorded when the aggregate row is gone.
        let orphan = new_tx(21, "Phi SMS", 1_100).natural_key();
        let err = store
            .merge_into(row.id + 100, &orphan, Money::from_dong(1_100))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!store.is_merged(&orphan).await.unwrap());
    }

    #[tokio::test]
    async fn update_missing_id_is_not_found() {
        let (_dir, store) = open_temp().await;
        let err = store
            .update(999, &TransactionPatch::category("Need"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(999)));
    }

    #[tokio::test]
    async fn list_filters_by_month_and_category() {
        let (_dir, store) = open_temp().await;
        let a = store.insert(&new_tx(1, "pho", 50_000)).await.unwrap();
        store.insert(&new_tx(2, "cafe", 30_000)).await.unwrap();
        store.update(a.id, &TransactionPatch::category("Food")).await.unwrap();

        let oct = MonthKey::new(2025, 10).unwrap();
        let food = store
            .list_transactions(&TransactionFilter::category("Food").within(oct), None)
            .await
            .unwrap();
        assert_eq!(food.len(), 1);
        assert_eq!(food[0].content, "pho");

        let nov = store
            .list_transactions(&TransactionFilter::default().within(oct.next()), None)
            .await
            .unwrap();
        assert!(nov.is_empty());
    }

    #[tokio::test]
    async fn patterns_keep_insertion_order() {
        let (_dir, store) = open_temp().await;
        store.insert_pattern(&NewPattern::new("grab", "Transport")).await.unwrap();
        store
            .insert_pattern(&NewPattern::new("shopee", "Shopping").with_new_content("Shopee"))
            .await
            .unwrap();

        let patterns = store.list_patterns().await.unwrap();
        let names: Vec<_> = patterns.iter().map(|p| p.receiver_pattern.as_str()).collect();
        assert_eq!(names, ["grab", "shopee"]);
        assert_eq!(patterns[1].new_content.as_deref(), Some("Shopee"));

        assert!(store.find_pattern("grab").await.unwrap().is_some());
        assert!(store.find_pattern("momo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn collaborator_tables_are_readable() {
        let (_dir, store) = open_temp().await;
        store.add_category_mapping("Groceries", AccountType::Need).await.unwrap();
        store.add_category_mapping("Rent", AccountType::Need).await.unwrap();
        store.set_budget("Groceries", Money::from_dong(3_000_000)).await.unwrap();

        assert_eq!(
            store.categories_for_type(AccountType::Need).await.unwrap(),
            ["Groceries", "Rent"]
        );
        assert!(store.categories_for_type(AccountType::Fun).await.unwrap().is_empty());
        assert_eq!(
            store.budget_for("Groceries").await.unwrap(),
            Some(Money::from_dong(3_000_000))
        );
        assert_eq!(store.budget_for("Rent").await.unwrap(), None);
    }
}
