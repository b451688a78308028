use async_trait::async_trait;
use chrono::Utc;
use tally_core::RawTransaction;

use crate::error::EmailError;
use crate::reply::parse_model_reply;

/// Abstraction over the email extraction backend.
/// A failed extraction yields no transaction and has no side effects.
#[async_trait]
pub trait EmailExtractor: Send + Sync {
    async fn extract(&self, subject: &str, body: &str) -> Result<RawTransaction, EmailError>;
}

/// Runs a fixed model reply through the normal reply parser.
pub struct MockExtractor {
    pub reply: String,
}

impl MockExtractor {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl EmailExtractor for MockExtractor {
    async fn extract(&self, _subject: &str, body: &str) -> Result<RawTransaction, EmailError> {
        parse_model_reply(&self.reply, body, Utc::now())
    }
}
