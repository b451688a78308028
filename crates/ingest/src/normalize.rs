//! Maps a source-specific [`RawTransaction`] onto the canonical shape.
//! Normalization never fails: malformed fields fall back to safe defaults.

use chrono::{Local, NaiveDateTime};
use serde_json::Value;
use tally_core::{account_code, Money, NewTransaction, RawTransaction, TransferType, UNCATEGORIZED};

use crate::settings::PipelineSettings;

/// Timestamp format used by webhook payloads and the email extractor.
pub const SOURCE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ISO_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn normalize(raw: &RawTransaction, settings: &PipelineSettings) -> NewTransaction {
    normalize_at(raw, settings, Local::now().naive_local())
}

/// Like [`normalize`], with an explicit fallback for unparseable dates.
pub fn normalize_at(
    raw: &RawTransaction,
    settings: &PipelineSettings,
    now: NaiveDateTime,
) -> NewTransaction {
    let gateway = raw.gateway.as_deref().map(str::trim).unwrap_or("Unknown");
    let content = raw.content.clone().unwrap_or_default();

    let transfer_amount = match coerce_amount(raw.transfer_amount.as_ref()) {
        Some(amount) => amount.abs(),
        None => {
            tracing::warn!(gateway, "missing or invalid transfer amount, using 0");
            Money::zero()
        }
    };

    let transfer_type = raw
        .transfer_type
        .as_deref()
        .and_then(|t| t.parse().ok())
        .unwrap_or_default();

    let description = non_blank(raw.description.as_deref())
        .map(str::to_string)
        .or_else(|| {
            non_blank(Some(content.as_str()))
                .map(|c| truncate_chars(c, settings.description_limit))
        });

    NewTransaction {
        account: account_code(gateway).to_string(),
        transaction_date: parse_date(raw.transaction_date.as_deref(), now),
        account_number: raw.account_number.clone().unwrap_or_default(),
        code: non_blank(raw.code.as_deref()).map(str::to_string),
        reference_code: non_blank(raw.reference_code.as_deref()).map(str::to_string),
        source_content: content.clone(),
        content,
        transfer_type,
        transfer_amount,
        accumulated: coerce_amount(raw.accumulated.as_ref()),
        description,
        receiver: non_blank(raw.receiver.as_deref()).map(str::to_string),
        category: UNCATEGORIZED.to_string(),
    }
}

fn parse_date(value: Option<&str>, now: NaiveDateTime) -> NaiveDateTime {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return now;
    };
    NaiveDateTime::parse_from_str(value, SOURCE_DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, ISO_DATE_FORMAT))
        .unwrap_or_else(|_| {
            tracing::warn!(value, "unparseable transaction date, using processing time");
            now
        })
}

/// Numbers and numeric strings become [`Money`]; anything else is absent.
fn coerce_amount(value: Option<&Value>) -> Option<Money> {
    match value? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}
