use tally_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Aggregation failed for '{label}': {source}")]
    Aggregation {
        label: String,
        #[source]
        source: StoreError,
    },
    #[error("Failed to save transaction: {0}")]
    Save(#[source] StoreError),
}
