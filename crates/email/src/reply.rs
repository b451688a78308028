use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tally_core::RawTransaction;

use crate::error::EmailError;

/// Fields the model must supply for the reply to count as a transaction.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "gateway",
    "transactionDate",
    "content",
    "transferType",
    "transferAmount",
];

const UNKNOWN_ACCOUNT: &str = "Unknown";
const DESCRIPTION_CHARS: usize = 500;

fn fenced() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("invalid regex")
    })
}

/// Removes a surrounding Markdown code fence (with or without a language tag).
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    fenced()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str())
}

/// Validates a model reply and fills the optional fields the webhook payload
/// normally carries. `body` is the email text; `now` becomes the event id.
pub fn parse_model_reply(
    reply: &str,
    body: &str,
    now: DateTime<Utc>,
) -> Result<RawTransaction, EmailError> {
    let value: Value = serde_json::from_str(strip_code_fences(reply))?;
    let Value::Object(mut fields) = value else {
        return Err(EmailError::NotAnObject);
    };

    if let Some(reason) = fields.get("error") {
        let reason = reason
            .as_str()
            .map_or_else(|| reason.to_string(), str::to_string);
        return Err(EmailError::NotATransaction(reason));
    }

    for field in REQUIRED_FIELDS {
        if !present(&fields, field) {
            return Err(EmailError::MissingField(field));
        }
    }

    if !present(&fields, "accountNumber") {
        fields.insert("accountNumber".into(), UNKNOWN_ACCOUNT.into());
    }
    if !present(&fields, "description") {
        let excerpt: String = body.chars().take(DESCRIPTION_CHARS).collect();
        fields.insert("description".into(), excerpt.into());
    }
    fields.insert("id".into(), now.timestamp_millis().into());

    Ok(serde_json::from_value(Value::Object(fields))?)
}

fn present(fields: &Map<String, Value>, key: &str) -> bool {
    fields.get(key).is_some_and(|v| !v.is_null())
}
