use std::sync::Arc;
use std::time::Duration;
use tally_core::{KnownPattern, NewTransaction, UNCATEGORIZED};
use tally_storage::{StoreError, TransactionStore};
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CachedPatterns {
    patterns: Arc<[KnownPattern]>,
    expires_at: Instant,
}

/// Process-local copy of the `known_receivers` table with a fixed TTL.
/// Safe to share between concurrent pipeline runs.
pub struct PatternCache {
    ttl: Duration,
    slot: RwLock<Option<CachedPatterns>>,
}

impl PatternCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Cached patterns, reloading from `store` once the TTL has elapsed.
    /// A failed load leaves the cache empty so the next call retries.
    pub async fn get_or_refresh<S>(&self, store: &S) -> Result<Arc<[KnownPattern]>, StoreError>
    where
        S: TransactionStore + ?Sized,
    {
        if let Some(patterns) = Self::fresh(&*self.slot.read().await) {
            return Ok(patterns);
        }

        let mut slot = self.slot.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(patterns) = Self::fresh(&slot) {
            return Ok(patterns);
        }

        let patterns: Arc<[KnownPattern]> = store.list_patterns().await?.into();
        tracing::debug!(count = patterns.len(), "loaded known patterns");
        *slot = Some(CachedPatterns {
            patterns: Arc::clone(&patterns),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(patterns)
    }

    /// Drop the cached set; the next read goes to the store.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
        tracing::info!("known pattern cache cleared");
    }

    fn fresh(slot: &Option<CachedPatterns>) -> Option<Arc<[KnownPattern]>> {
        slot.as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| Arc::clone(&cached.patterns))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub new_content: Option<String>,
    pub matched_pattern: Option<String>,
}

impl Classification {
    pub fn uncategorized() -> Self {
        Classification {
            category: UNCATEGORIZED.to_string(),
            new_content: None,
            matched_pattern: None,
        }
    }
}

/// First pattern, in the given order, whose needle occurs in `text`.
/// `text` is expected to be lowercased already.
pub fn first_match<'a>(patterns: &'a [KnownPattern], text: &str) -> Option<&'a KnownPattern> {
    patterns
        .iter()
        .find(|p| p.needle().is_some_and(|needle| text.contains(&needle)))
}

/// Assigns a category (and optional replacement content) from the known
/// pattern set.
pub struct PatternMatcher {
    cache: PatternCache,
}

impl PatternMatcher {
    pub fn new(cache: PatternCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &PatternCache {
        &self.cache
    }

    pub async fn classify<S>(&self, store: &S, tx: &NewTransaction) -> Classification
    where
        S: TransactionStore + ?Sized,
    {
        let text = tx.search_text();
        if text.trim().is_empty() {
            return Classification::uncategorized();
        }

        let patterns = match self.cache.get_or_refresh(store).await {
            Ok(patterns) => patterns,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load known patterns");
                return Classification::uncategorized();
            }
        };

        let Some(pattern) = first_match(&patterns, &text) else {
            return Classification::uncategorized();
        };

        tracing::info!(
            pattern = %pattern.receiver_pattern,
            category = %pattern.category,
            rewrite = pattern.replacement().is_some(),
            "matched known pattern"
        );
        Classification {
            category: pattern.category.clone(),
            new_content: pattern.replacement().map(str::to_string),
            matched_pattern: Some(pattern.receiver_pattern.clone()),
        }
    }
}
