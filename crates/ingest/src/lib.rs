pub mod aggregate;
pub mod dedup;
pub mod error;
pub mod matcher;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod review;
pub mod settings;

pub use aggregate::{AggregateOutcome, Aggregator};
pub use error::PipelineError;
pub use matcher::{Classification, PatternCache, PatternMatcher};
pub use normalize::{normalize, normalize_at};
pub use pipeline::Pipeline;
pub use report::{category_summary, stats, CategorySummary, Expense, TransactionStats};
pub use review::{
    categories_for, categorize, pending_review, promote_pattern, suggest_pattern,
    PromoteOutcome, REVIEW_BATCH,
};
pub use settings::{PipelineSettings, SettingsError};
