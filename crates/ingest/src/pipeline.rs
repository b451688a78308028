use std::sync::Arc;
use tally_core::{NewTransaction, ProcessingResult, RawTransaction};
use tally_storage::TransactionStore;

use crate::aggregate::{AggregateOutcome, Aggregator};
use crate::dedup;
use crate::error::PipelineError;
use crate::matcher::{PatternCache, PatternMatcher};
use crate::normalize::normalize;
use crate::settings::PipelineSettings;

/// Orchestrates: normalize → duplicate check → classify → aggregate → insert.
pub struct Pipeline<S: ?Sized> {
    store: Arc<S>,
    settings: PipelineSettings,
    matcher: PatternMatcher,
    aggregator: Aggregator,
}

impl<S> Pipeline<S>
where
    S: TransactionStore + ?Sized,
{
    pub fn new(store: Arc<S>, settings: PipelineSettings) -> Self {
        let matcher = PatternMatcher::new(PatternCache::new(settings.pattern_cache_ttl()));
        let aggregator = Aggregator::new(&settings);
        Self {
            store,
            settings,
            matcher,
            aggregator,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn pattern_cache(&self) -> &PatternCache {
        self.matcher.cache()
    }

    /// Force the next classification to reload known patterns.
    pub async fn refresh_patterns(&self) {
        self.matcher.cache().invalidate().await;
    }

    pub async fn process(&self, raw: &RawTransaction) -> ProcessingResult {
        self.process_normalized(normalize(raw, &self.settings)).await
    }

    pub async fn process_normalized(&self, mut tx: NewTransaction) -> ProcessingResult {
        // Identity is fixed before categorization can rewrite the content.
        let key = tx.natural_key();
        if dedup::exists(&*self.store, &key).await {
            tracing::info!(account = %tx.account, amount = %tx.transfer_amount, "duplicate skipped");
            return ProcessingResult::duplicate();
        }

        let classification = self.matcher.classify(&*self.store, &tx).await;
        let content_modified = match classification.new_content {
            Some(new_content) => {
                tx.content = new_content;
                true
            }
            None => false,
        };
        tx.category = classification.category;

        match self.aggregator.apply(&*self.store, &tx).await {
            Ok(AggregateOutcome::NotApplicable) => {}
            Ok(AggregateOutcome::Merged(row)) => return ProcessingResult::aggregated(row, false),
            Ok(AggregateOutcome::Created(row)) => return ProcessingResult::aggregated(row, true),
            Err(e) => {
                tracing::error!(error = %e, amount = %tx.transfer_amount, "aggregation failed");
                return ProcessingResult::failed(e).with_category(&tx.category);
            }
        }

        match self.store.insert(&tx).await {
            Ok(stored) => {
                tracing::info!(
                    id = stored.id,
                    account = %stored.account,
                    amount = %stored.transfer_amount,
                    transfer_type = %stored.transfer_type,
                    category = %stored.category,
                    content_modified,
                    "transaction saved"
                );
                ProcessingResult::saved(stored, content_modified)
            }
            Err(e) => {
                let e = PipelineError::Save(e);
                tracing::error!(error = %e, account = %tx.account, "failed to save transaction");
                ProcessingResult::failed(e).with_category(&tx.category)
            }
        }
    }
}
