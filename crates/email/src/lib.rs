//! Turns a bank notification email into a [`tally_core::RawTransaction`] by
//! asking a language model to extract the fields.

pub mod encoding;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod reply;

pub use encoding::repair_mojibake;
pub use error::EmailError;
pub use extractor::{EmailExtractor, MockExtractor};
pub use gemini::{GeminiExtractor, DEFAULT_GEMINI_MODEL};
pub use reply::{parse_model_reply, strip_code_fences};
