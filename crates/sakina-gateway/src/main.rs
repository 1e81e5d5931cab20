//! Sakina gateway: `/ws/tools` command channel, health and session documentation.

mod commands;
mod ws;

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use dashmap::DashMap;
use sakina_core::{
    ClientHub, CoreConfig, ExportFormat, PersonaId, PersonaOrchestrator, SessionDocumentation, ToolRegistry,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Live sessions keyed by orchestrator session id.
pub type SessionDirectory = DashMap<String, Arc<Mutex<PersonaOrchestrator>>>;

pub struct AppState {
    pub config: CoreConfig,
    pub hub: Arc<ClientHub>,
    pub sessions: SessionDirectory,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({"error": message.into()})))
}

#[derive(Deserialize)]
struct DocumentationQuery {
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct ExportRequest {
    session_id: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::load()?;
    let addr = config.bind_addr();
    let state = Arc::new(AppState {
        config,
        hub: Arc::new(ClientHub::new()),
        sessions: DashMap::new(),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws/tools", get(ws::tools_socket))
        .route("/session/documentation", get(session_documentation))
        .route("/session/export", post(export_session))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(target: "sakina::gateway", %addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.config.app_name,
        "features": {
            "crisis_detection": true,
            "cbt_techniques": true,
            "emotional_analysis": true,
            "session_management": true,
            "cultural_adaptation": true,
            "gulf_arabic_support": true,
        },
        "available_tools": ToolRegistry::with_default_tools().list_registered(),
        "therapeutic_personas": PersonaId::ALL,
        "default_persona": state.config.default_persona,
        "active_sessions": state.sessions.len(),
        "connected_clients": state.hub.len(),
        "clinical_safety": "enabled",
    }))
}

/// Named session, or the only live one when no id is given.
fn resolve_session(state: &AppState, session_id: Option<&str>) -> Result<Arc<Mutex<PersonaOrchestrator>>, ApiError> {
    match session_id {
        Some(id) => state
            .sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("No live session '{id}'"))),
        None if state.sessions.len() == 1 => state
            .sessions
            .iter()
            .next()
            .map(|entry| entry.value().clone())
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No live session")),
        None => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("session_id is required ({} live sessions)", state.sessions.len()),
        )),
    }
}

async fn capture(state: &AppState, session_id: Option<&str>) -> Result<SessionDocumentation, ApiError> {
    let session = resolve_session(state, session_id)?;
    let orch = session.lock().await;
    Ok(SessionDocumentation::capture(&orch, &state.config.app_name))
}

async fn session_documentation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DocumentationQuery>,
) -> Result<Json<Value>, ApiError> {
    let doc = capture(&state, query.session_id.as_deref()).await?;
    Ok(Json(doc.to_json()))
}

async fn export_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExportRequest>,
) -> Result<Json<Value>, ApiError> {
    let format = match body.format.as_deref() {
        None => ExportFormat::Json,
        Some(name) => ExportFormat::from_str(name)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Supported formats: json, clinical_notes"))?,
    };
    let doc = capture(&state, body.session_id.as_deref()).await?;
    tracing::info!(
        target: "sakina::gateway",
        session_id = %doc.session_overview.session_id,
        format = format.as_str(),
        "session exported"
    );
    Ok(Json(doc.export(format)))
}
