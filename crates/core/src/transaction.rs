use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::money::Money;

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    /// Money received.
    #[default]
    In,
    /// Money spent.
    Out,
}

impl TransferType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferType::In => "in",
            TransferType::Out => "out",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransferType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in" => Ok(TransferType::In),
            "out" => Ok(TransferType::Out),
            other => Err(format!("Unknown transfer type: '{other}'")),
        }
    }
}

/// A transaction notification as delivered by a webhook or produced by the
/// email extractor. Nothing here is validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gateway: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transfer_type: Option<String>,
    #[serde(default)]
    pub transfer_amount: Option<Value>,
    #[serde(default)]
    pub accumulated: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sub_account: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reference_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub receiver: Option<String>,
}

/// Accepts a string, a number (account numbers sometimes arrive unquoted) or null.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// The fields that identify one real-world event. `content` is the text as
/// received, before any categorization rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub transaction_date: NaiveDateTime,
    pub transfer_amount: Money,
    pub account_number: String,
    pub content: String,
}

/// A normalized transaction that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub account: String,
    pub transaction_date: NaiveDateTime,
    pub account_number: String,
    pub code: Option<String>,
    pub reference_code: Option<String>,
    pub content: String,
    /// `content` as received. Pattern rewrites and aggregation leave it alone.
    pub source_content: String,
    pub transfer_type: TransferType,
    pub transfer_amount: Money,
    pub accumulated: Option<Money>,
    pub description: Option<String>,
    /// Only used for matching; never persisted.
    #[serde(default, skip_serializing)]
    pub receiver: Option<String>,
    pub category: String,
}

impl NewTransaction {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            transaction_date: self.transaction_date,
            transfer_amount: self.transfer_amount,
            account_number: self.account_number.clone(),
            content: self.source_content.clone(),
        }
    }

    /// Lowercased `content`, `description`, `receiver` and `code`, skipping
    /// empty fields, joined by single spaces.
    pub fn search_text(&self) -> String {
        [
            Some(self.content.as_str()),
            self.description.as_deref(),
            self.receiver.as_deref(),
            self.code.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// A stored transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account: String,
    pub transaction_date: NaiveDateTime,
    pub account_number: String,
    pub code: Option<String>,
    pub reference_code: Option<String>,
    pub content: String,
    pub source_content: String,
    pub transfer_type: TransferType,
    pub transfer_amount: Money,
    pub accumulated: Option<Money>,
    pub description: Option<String>,
    pub category: String,
}

impl Transaction {
    pub fn from_new(id: i64, tx: NewTransaction) -> Self {
        Transaction {
            id,
            account: tx.account,
            transaction_date: tx.transaction_date,
            account_number: tx.account_number,
            code: tx.code,
            reference_code: tx.reference_code,
            content: tx.content,
            source_content: tx.source_content,
            transfer_type: tx.transfer_type,
            transfer_amount: tx.transfer_amount,
            accumulated: tx.accumulated,
            description: tx.description,
            category: tx.category,
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self.category == UNCATEGORIZED
    }
}
