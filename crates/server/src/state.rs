use std::sync::Arc;
use tally_email::EmailExtractor;
use tally_ingest::{Pipeline, PipelineSettings};
use tally_storage::TransactionStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pipeline: Pipeline<dyn TransactionStore>,
    /// `None` when no model API key is configured.
    pub extractor: Option<Arc<dyn EmailExtractor>>,
    pub webhook_api_key: Option<String>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        settings: PipelineSettings,
        extractor: Option<Arc<dyn EmailExtractor>>,
        webhook_api_key: Option<String>,
    ) -> Self {
        AppState {
            pipeline: Pipeline::new(store, settings),
            extractor,
            webhook_api_key,
        }
    }

    pub fn store(&self) -> &dyn TransactionStore {
        self.pipeline.store().as_ref()
    }
}
