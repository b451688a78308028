use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tally_core::{ProcessingResult, RawTransaction};

use super::json_body;
use crate::error::AppError;
use crate::state::SharedState;

#[derive(Serialize)]
struct WebhookResponse<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
    duplicate: bool,
    aggregated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parsed_data: Option<&'a RawTransaction>,
}

/// 200 when the pipeline accepted the event (saved, merged or duplicate), 500 otherwise.
fn pipeline_response(result: &ProcessingResult, parsed: Option<&RawTransaction>) -> Response {
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = WebhookResponse {
        success: result.success,
        message: result.message.as_deref(),
        category: result.category.as_deref(),
        duplicate: result.duplicate,
        aggregated: result.aggregated,
        error: result.error.as_deref(),
        parsed_data: parsed.filter(|_| result.success),
    };
    (status, Json(body)).into_response()
}

/// Checks `Authorization: Apikey <key>` against the configured key.
fn check_api_key(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let expected = expected.ok_or(AppError::Unavailable("Webhook API key is not configured"))?;
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized("Missing Authorization header"))?;
    let key = header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Apikey "))
        .ok_or(AppError::Unauthorized("Invalid Authorization format"))?;
    if key.trim() != expected {
        return Err(AppError::Forbidden("Invalid API Key"));
    }
    Ok(())
}

pub async fn receive_sepay(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    check_api_key(&headers, state.webhook_api_key.as_deref())?;
    let raw: RawTransaction = json_body(&body)?;

    tracing::info!(
        gateway = raw.gateway.as_deref().unwrap_or_default(),
        transfer_type = raw.transfer_type.as_deref().unwrap_or_default(),
        "payment webhook received"
    );
    let result = state.pipeline.process(&raw).await;
    Ok(pipeline_response(&result, None))
}

#[derive(Debug, Deserialize)]
pub struct EmailPayload {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub from: String,
}

pub async fn receive_email(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let email: EmailPayload = json_body(&body)?;
    if email.body.trim().is_empty() {
        return Err(AppError::BadRequest("Email body required".to_string()));
    }
    let extractor = state
        .extractor
        .as_ref()
        .ok_or(AppError::Unavailable("Email extraction is not configured"))?;

    tracing::info!(
        from = %email.from,
        subject = %email.subject,
        chars = email.body.chars().count(),
        "email received"
    );
    let raw = match extractor.extract(&email.subject, &email.body).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "email extraction failed");
            return Err(AppError::BadRequest("Could not parse email".to_string()));
        }
    };

    let result = state.pipeline.process(&raw).await;
    Ok(pipeline_response(&result, Some(&raw)))
}
