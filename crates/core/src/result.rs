use serde::{Deserialize, Serialize};

use super::transaction::Transaction;

/// Outcome of running one raw transaction through the ingest pipeline.
/// Every entry point returns this shape; failures never escape as errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub duplicate: bool,
    pub aggregated: bool,
    pub content_modified: bool,
    pub category: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub transaction: Option<Transaction>,
}

impl ProcessingResult {
    pub fn saved(transaction: Transaction, content_modified: bool) -> Self {
        ProcessingResult {
            success: true,
            content_modified,
            category: Some(transaction.category.clone()),
            message: Some("Transaction saved successfully".to_string()),
            transaction: Some(transaction),
            ..Default::default()
        }
    }

    pub fn duplicate() -> Self {
        ProcessingResult {
            success: true,
            duplicate: true,
            message: Some("Transaction already exists".to_string()),
            ..Default::default()
        }
    }

    /// `created` is true when this occurrence opened a new monthly aggregate.
    pub fn aggregated(transaction: Transaction, created: bool) -> Self {
        let message = if created {
            "Monthly aggregate created"
        } else {
            "Merged into monthly aggregate"
        };
        ProcessingResult {
            success: true,
            aggregated: true,
            category: Some(transaction.category.clone()),
            message: Some(message.to_string()),
            transaction: Some(transaction),
            ..Default::default()
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        ProcessingResult {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Keeps the resolved category on a failure so callers can still report it.
    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
}
