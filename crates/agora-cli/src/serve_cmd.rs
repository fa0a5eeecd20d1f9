use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use agora_core::event::NDJSON_CONTENT_TYPE;
use agora_core::orchestrator::{DebateError, DebateOrchestrator, DebateResult};
use agora_core::speech::{DEFAULT_VOICE, SpeechSynthesizer};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.into(),
        }
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        let err = err.into();
        tracing::error!(error = %format!("{err:#}"), "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DebateRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    #[serde(default = "default_voice")]
    pub voice_id: String,
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

#[derive(Debug, Serialize)]
pub struct SpeakResponse {
    pub audio_content: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: DebateOrchestrator,
    /// `None` disables `/api/speak`.
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/debate", post(debate))
        .route("/api/debate/stream", post(debate_stream))
        .route("/api/speak", post(speak))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("agora serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("agora serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn validate_question(question: &str) -> Result<String, AppError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::bad_request("question must not be empty"));
    }
    Ok(question.to_string())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "agora debate API is running" }))
}

async fn debate(
    State(state): State<AppState>,
    Json(req): Json<DebateRequest>,
) -> Result<Json<DebateResult>, AppError> {
    let question = validate_question(&req.question)?;
    let result = state
        .orchestrator
        .run(question)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(result))
}

async fn debate_stream(
    State(state): State<AppState>,
    Json(req): Json<DebateRequest>,
) -> Result<Response, AppError> {
    let question = validate_question(&req.question)?;

    let lines = state
        .orchestrator
        .run_stream(question)
        .map(|event| -> Result<String, DebateError> {
            let line = event.and_then(|e| Ok(e.to_ndjson()?));
            if let Err(e) = &line {
                tracing::error!(error = %e, "debate stream aborted");
            }
            line
        });

    Ok((
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response())
}

async fn speak(
    State(state): State<AppState>,
    Json(req): Json<SpeakRequest>,
) -> Result<Json<SpeakResponse>, AppError> {
    let Some(speech) = &state.speech else {
        return Err(AppError::unavailable(
            "speech synthesis is not configured; set AGORA_TTS_API_KEY",
        ));
    };
    if req.text.trim().is_empty() {
        return Err(AppError::bad_request("text must not be empty"));
    }

    let audio_content = speech
        .synthesize(&req.text, &req.voice_id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(SpeakResponse { audio_content }))
}
