//! Folds small transactions of one designated category into a single
//! running-total row per calendar month.
//!
//! Individual occurrences are not stored once merged; only the monthly total
//! survives, plus each occurrence's natural key so a redelivery is still
//! recognized as a duplicate. The lookup and the insert of a month's first occurrence are two
//! separate store calls, so two concurrent first occurrences can each create
//! an aggregate row. Increments are applied by the store in one statement.

use tally_core::{Money, MonthKey, NewTransaction, Transaction};
use tally_storage::{TransactionFilter, TransactionStore};

use crate::error::PipelineError;
use crate::settings::PipelineSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    /// Category or amount does not qualify; insert normally.
    NotApplicable,
    /// Added to an existing monthly row.
    Merged(Transaction),
    /// First occurrence of the month; a new aggregate row was stored.
    Created(Transaction),
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    category: String,
    label: String,
    threshold: Money,
}

impl Aggregator {
    pub fn new(settings: &PipelineSettings) -> Self {
        Self {
            category: settings.aggregate_category.clone(),
            label: settings.aggregate_label.clone(),
            threshold: settings.aggregate_threshold,
        }
    }

    pub fn applies(&self, category: &str, amount: Money) -> bool {
        category == self.category && amount <= self.threshold
    }

    /// `"<label> MM/YYYY"`
    pub fn label_for(&self, month: MonthKey) -> String {
        format!("{} {}", self.label, month)
    }

    pub async fn apply<S>(
        &self,
        store: &S,
        tx: &NewTransaction,
    ) -> Result<AggregateOutcome, PipelineError>
    where
        S: TransactionStore + ?Sized,
    {
        if !self.applies(&tx.category, tx.transfer_amount) {
            return Ok(AggregateOutcome::NotApplicable);
        }

        let label = self.label_for(MonthKey::of_datetime(tx.transaction_date));
        let failed = |source| PipelineError::Aggregation {
            label: label.clone(),
            source,
        };

        let existing = store
            .find_matching(&TransactionFilter::content(&label))
            .await
            .map_err(failed)?;

        match existing {
            Some(row) => {
                let merged = store
                    .merge_into(row.id, &tx.natural_key(), tx.transfer_amount)
                    .await
                    .map_err(failed)?;
                tracing::info!(
                    id = merged.id,
                    amount = %tx.transfer_amount,
                    total = %merged.transfer_amount,
                    label = %label,
                    "merged into monthly aggregate"
                );
                Ok(AggregateOutcome::Merged(merged))
            }
            None => {
                let mut first = tx.clone();
                first.content = label.clone();
                let created = store.insert(&first).await.map_err(failed)?;
                store
                    .record_merged(&tx.natural_key(), created.id)
                    .await
                    .map_err(failed)?;
                tracing::info!(
                    id = created.id,
                    amount = %tx.transfer_amount,
                    label = %label,
                    "created monthly aggregate"
                );
                Ok(AggregateOutcome::Created(created))
            }
        }
    }
}
