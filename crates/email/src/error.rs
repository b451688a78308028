use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Model reply contained no text")]
    EmptyReply,
    #[error("Model reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Model reply is not a JSON object")]
    NotAnObject,
    #[error("Not a bank transaction email: {0}")]
    NotATransaction(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
