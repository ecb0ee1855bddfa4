use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{gemini::GeminiError, session::Busy};

pub const FAILURE_PREFIX: &str = "Failed to generate email sequence.";
pub const BANNER_PREFIX: &str = "--- AN ERROR OCCURRED ---";

/// Every way a single generation can fail, by cause.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    Transport(String),
    #[error("Received an empty response from the API.")]
    EmptyResponse,
    #[error("Malformed JSON received from API: {0}")]
    MalformedResponse(String),
    #[error("Invalid JSON structure received from API: {0}")]
    InvalidStructure(String),
}

impl GenerationError {
    /// Message shown to the user. Input problems are reported as-is; anything
    /// that happened after dispatch carries the failure prefix.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Validation(msg) => msg.clone(),
            other => format!("{FAILURE_PREFIX} {other}"),
        }
    }

    /// Failure banner form stored in the session.
    pub fn banner(&self) -> String {
        format!("{BANNER_PREFIX}\n{}", self.user_message())
    }

    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::Validation(_) => "VALIDATION_ERROR",
            GenerationError::Configuration(_) => "CONFIGURATION_ERROR",
            GenerationError::Transport(_) => "UPSTREAM_ERROR",
            GenerationError::EmptyResponse => "EMPTY_RESPONSE",
            GenerationError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            GenerationError::InvalidStructure(_) => "INVALID_STRUCTURE",
        }
    }
}

impl From<GeminiError> for GenerationError {
    fn from(e: GeminiError) -> Self {
        let message = e.to_string();
        match e {
            GeminiError::MissingApiKey(_) => GenerationError::Configuration(message),
            _ => GenerationError::Transport(message),
        }
    }
}

/// HTTP-facing error with a JSON envelope.
#[derive(Debug)]
pub enum ApiError {
    Generation(GenerationError),
    Busy,
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        ApiError::Generation(e)
    }
}

impl From<Busy> for ApiError {
    fn from(_: Busy) -> Self {
        ApiError::Busy
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Generation(e) => {
                let status = match e {
                    GenerationError::Validation(_) => StatusCode::BAD_REQUEST,
                    GenerationError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, e.code(), e.user_message())
            }
            ApiError::Busy => (
                StatusCode::CONFLICT,
                "GENERATION_IN_PROGRESS",
                "A sequence is already being generated.".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone()),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}
