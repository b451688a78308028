//! Gemini `generateContent` client.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;
use tally_core::RawTransaction;

use crate::encoding::repair_mojibake;
use crate::error::EmailError;
use crate::extractor::EmailExtractor;
use crate::reply::parse_model_reply;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .find_map(|p| p.text)
    }
}

pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: API_BASE.to_string(),
        })
    }

    /// Point at a different API root (a proxy or a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn generate(&self, prompt: &str) -> Result<String, EmailError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GenerateResponse>()
            .await?
            .first_text()
            .ok_or(EmailError::EmptyReply)
    }
}

#[async_trait]
impl EmailExtractor for GeminiExtractor {
    async fn extract(&self, subject: &str, body: &str) -> Result<RawTransaction, EmailError> {
        let (prompt, body) = prompt_for(subject, body);
        tracing::debug!(model = %self.model, chars = body.chars().count(), "extracting email");
        let reply = self.generate(&prompt).await?;
        let raw = parse_model_reply(&reply, &body, Utc::now());
        match &raw {
            Ok(tx) => tracing::info!(
                gateway = tx.gateway.as_deref().unwrap_or_default(),
                transfer_type = tx.transfer_type.as_deref().unwrap_or_default(),
                "email parsed"
            ),
            Err(e) => tracing::warn!(error = %e, "model reply rejected"),
        }
        raw
    }
}

/// Repairs mis-decoded subject and body text, then builds the prompt.
/// The repaired body is returned for the description fallback.
fn prompt_for<'a>(subject: &str, body: &'a str) -> (String, Cow<'a, str>) {
    let body = repair_mojibake(body);
    (build_prompt(&repair_mojibake(subject), &body), body)
}

pub fn build_prompt(subject: &str, body: &str) -> String {
    format!(
        r#"You are a bank transaction email parser. Extract transaction information from the email below and return ONLY a valid JSON object.

Email Subject: {subject}

Email Content:
{body}

Extract the following information and return as JSON:
- gateway: Bank name (Vietcombank, MB, BIDV, Techcombank, VPBank, ACB, Cake, etc.)
- transactionDate: Date and time in format "YYYY-MM-DD HH:MM:SS"
- accountNumber: The account number (sender account)
- content: Transaction description/content
- transferType: "in" for money received, "out" for money spent/transferred
- transferAmount: Amount as a number (no currency symbols or commas)
- accumulated: Account balance after transaction (if available, otherwise null)
- receiver: The receiver name or account if this is a transfer out

Return ONLY the JSON object, no explanation or markdown formatting.

Example output format:
{{
  "gateway": "Cake",
  "transactionDate": "2025-10-08 21:14:13",
  "accountNumber": "0986381568",
  "content": "Chuyen tien ngoai CAKE",
  "transferType": "out",
  "transferAmount": 28000,
  "accumulated": null,
  "receiver": "PHAN THE ANH"
}}

If you cannot extract the information or this is not a bank transaction email, return:
{{"error": "Not a valid bank transaction email"}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_subject_and_body() {
        let prompt = build_prompt("Thong bao giao dich", "So tien -28.000 d");
        assert!(prompt.contains("Email Subject: Thong bao giao dich"));
        assert!(prompt.contains("So tien -28.000 d"));
        assert!(prompt.contains(r#"{"error": "Not a valid bank transaction email"}"#));
    }

    #[test]
    fn garbled_email_text_is_repaired_before_prompting() {
        let (prompt, body) = prompt_for("ThÃ´ng bÃ¡o giao dá»\u{2039}ch", "Sá»‘ tiá»\u{81}n -28.000 Ä\u{2018}");
        assert!(prompt.contains("Email Subject: Thông báo giao dịch"));
        assert_eq!(body, "Số tiền -28.000 đ");
        assert!(prompt.contains("Số tiền -28.000 đ"));
    }

    #[test]
    fn first_candidate_text_is_used() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":1}"}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.first_text().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn empty_response_has_no_text() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(response.first_text(), None);
        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(blocked.first_text(), None);
    }

    #[test]
    fn base_url_is_overridable() {
        let g = GeminiExtractor::new("key", DEFAULT_GEMINI_MODEL)
            .unwrap()
            .with_base_url("http://127.0.0.1:9/v1beta/");
        assert_eq!(g.base_url, "http://127.0.0.1:9/v1beta/");
    }
}
