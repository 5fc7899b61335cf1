use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GateError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(typegate::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(typegate::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(typegate::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Bad request: {0}")]
    #[diagnostic(code(typegate::bad_request))]
    BadRequest(String),

    #[error("{0}")]
    #[diagnostic(code(typegate::other))]
    Other(String),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GateError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
