use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::ApiError,
    export,
    generator::SequenceGenerator,
    models::{AppSettings, EmailSequence, GenerationRequest, SessionSnapshot},
    session::Session,
    settings::SettingsStore,
};

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub generator: SequenceGenerator,
    pub settings: Arc<SettingsStore>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sequence", post(generate_sequence).get(get_sequence))
        .route("/api/sequence/export", get(export_sequence))
        .route("/api/sequence/:position/copy", get(copy_email))
        .route("/api/settings", get(get_settings).put(put_settings))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn generate_sequence(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<EmailSequence>, ApiError> {
    let Json(body) = payload?;
    // Input is checked before the slot is taken, so a bad form never shows as in-flight.
    let prepared = state.generator.prepare(&body)?;
    let ticket = state.session.try_begin()?;

    // Detached so the outcome is recorded even if the caller disconnects.
    let generator = state.generator.clone();
    let task = tokio::spawn(async move {
        let result = generator.run(&body.product, &prepared).await;
        ticket.finish(result)
    });

    match task.await {
        Ok(result) => Ok(Json(result?)),
        Err(e) => {
            tracing::error!("❌ Generation task failed: {}", e);
            Err(ApiError::Internal("Generation stopped unexpectedly.".into()))
        }
    }
}

pub async fn get_sequence(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

fn last_sequence(state: &AppState) -> Result<EmailSequence, ApiError> {
    state.session
        .last_sequence()
        .ok_or_else(|| ApiError::NotFound("No email sequence has been generated yet.".into()))
}

pub async fn export_sequence(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let seq = last_sequence(&state)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], export::sequence_text(&seq)))
}

pub async fn copy_email(
    position: Result<Path<usize>, PathRejection>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(position) = position?;
    if !(1..=3).contains(&position) {
        return Err(ApiError::BadRequest(format!("Email position must be 1, 2 or 3, got {position}.")));
    }
    let seq = last_sequence(&state)?;
    let email = seq
        .get(position)
        .ok_or_else(|| ApiError::NotFound(format!("No email at position {position}.")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], export::copy_text(email)))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<AppSettings> {
    Json(state.settings.get())
}

pub async fn put_settings(
    State(state): State<AppState>,
    payload: Result<Json<AppSettings>, JsonRejection>,
) -> Result<Json<AppSettings>, ApiError> {
    let Json(body) = payload?;
    tracing::info!("💾 Saving settings for product: {}", body.product);
    state.settings.set(body.clone());
    Ok(Json(body))
}
