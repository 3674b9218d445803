use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{routing::{get, patch, post}, Json, Router};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::catalog::{self, Catalog};
use crate::controller::{TurnController, TurnOutcome};
use crate::error::TurnError;
use crate::models::CompletionService;
use crate::session::{ChatMessage, ProfilePatch, Stage, TravelProfile};
use crate::settings::EffectiveSettings;
use crate::storage::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub completions: Arc<dyn CompletionService>,
    pub settings: Arc<EffectiveSettings>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(completions: Arc<dyn CompletionService>, settings: EffectiveSettings) -> Self {
        Self { sessions: SessionManager::default(), completions, settings: Arc::new(settings), metrics: None }
    }

    fn controller(&self) -> TurnController<'_> {
        TurnController::new(self.completions.as_ref(), &self.settings)
    }
}

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    Conflict(String),
    Unprocessable(String),
    BadGateway(String),
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::WrongStage { .. } => ApiError::Conflict(e.to_string()),
            TurnError::MessageTooLong { .. } | TurnError::Profile(_) => ApiError::Unprocessable(e.to_string()),
            TurnError::Completion(ref inner) => {
                tracing::error!("completion failed: {inner:#}");
                ApiError::BadGateway(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "session not found".to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateSessionBody {
    pub profile: Option<ProfilePatch>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionIdResponse {
    pub id: Uuid,
}

async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionBody>>,
) -> Result<Json<SessionIdResponse>, ApiError> {
    let mut profile = TravelProfile::default();
    if let Some(patch) = body.and_then(|Json(b)| b.profile) {
        profile.apply_patch(patch).map_err(TurnError::from)?;
    }
    let id = state.sessions.create(profile).await;
    tracing::info!(session = %id, "session created");
    Ok(Json(SessionIdResponse { id }))
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<Uuid>,
}

async fn list_sessions(State(state): State<AppState>) -> Json<ListSessionsResponse> {
    Json(ListSessionsResponse { sessions: state.sessions.list().await })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub profile: TravelProfile,
    pub messages: Vec<ChatMessage>,
    pub user_message_count: u32,
    pub max_user_messages: u32,
    pub remaining_messages: u32,
    pub input_enabled: bool,
    pub summary: Option<String>,
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = state.sessions.get(id).await.ok_or(ApiError::NotFound)?;
    let mut s = shared.lock().await;
    s.touch();
    let max = state.settings.max_user_messages;
    Ok(Json(SessionView {
        id: s.id,
        created_at: s.created_at,
        stage: s.stage(),
        profile: s.profile.clone(),
        messages: s.visible_messages().cloned().collect(),
        user_message_count: s.user_message_count,
        max_user_messages: max,
        remaining_messages: max.saturating_sub(s.user_message_count),
        input_enabled: state.controller().input_enabled(&s),
        summary: s.summary.clone(),
    }))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.sessions.remove(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn patch_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<TravelProfile>, ApiError> {
    let shared = state.sessions.get(id).await.ok_or(ApiError::NotFound)?;
    let mut s = shared.lock().await;
    s.touch();
    state.controller().update_profile(&mut s, patch)?;
    Ok(Json(s.profile.clone()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub greeting: Option<String>,
}

async fn start_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StartResponse>, ApiError> {
    let shared = state.sessions.get(id).await.ok_or(ApiError::NotFound)?;
    let mut s = shared.lock().await;
    s.touch();
    let greeting = state.controller().start_chat(&mut s).await?;
    Ok(Json(StartResponse { greeting }))
}

#[derive(Debug, Deserialize)]
pub struct PostMessageBody {
    pub content: String,
}

enum TurnEvent {
    Token(String),
    Finished(TurnOutcome),
    Failed(String),
}

impl TurnEvent {
    fn into_sse(self) -> Event {
        match self {
            TurnEvent::Token(text) => Event::default().event("token").data(json!({ "text": text }).to_string()),
            TurnEvent::Finished(outcome @ TurnOutcome::Replied { .. }) => {
                Event::default().event("done").data(json!(outcome).to_string())
            }
            TurnEvent::Finished(TurnOutcome::Ignored) => {
                Event::default().event("ignored").data(json!({ "outcome": "ignored" }).to_string())
            }
            TurnEvent::Failed(message) => Event::default().event("error").data(json!({ "error": message }).to_string()),
        }
    }
}

/// Runs one turn on a background task and relays its fragments as SSE.
/// Setup-stage and over-length turns are reported as plain HTTP errors before
/// the stream opens; once input is closed every turn answers `ignored`.
async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PostMessageBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let shared = state.sessions.get(id).await.ok_or(ApiError::NotFound)?;
    {
        let s = shared.lock().await;
        if s.stage() == Stage::Setup {
            return Err(TurnError::WrongStage { stage: Stage::Setup }.into());
        }
        let max = state.settings.max_message_chars;
        if state.controller().input_enabled(&s) && body.content.chars().count() > max {
            return Err(TurnError::MessageTooLong { max }.into());
        }
    }

    let (tx, rx) = mpsc::unbounded_channel::<TurnEvent>();
    tokio::spawn(async move {
        let mut s = shared.lock().await;
        s.touch();
        let token_tx = tx.clone();
        let result = state
            .controller()
            .submit_message(&mut s, &body.content, move |t| {
                let _ = token_tx.send(TurnEvent::Token(t.to_string()));
            })
            .await;
        let last = match result {
            Ok(outcome) => TurnEvent::Finished(outcome),
            Err(e) => {
                tracing::warn!(session = %id, "turn failed: {e}");
                TurnEvent::Failed(e.to_string())
            }
        };
        let _ = tx.send(last);
    });

    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|ev| (Ok(ev.into_sse()), rx))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping")))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

async fn request_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let shared = state.sessions.get(id).await.ok_or(ApiError::NotFound)?;
    let mut s = shared.lock().await;
    s.touch();
    let summary = state.controller().request_summary(&mut s).await?;
    Ok(Json(SummaryResponse { summary }))
}

async fn restart_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionIdResponse>, ApiError> {
    let shared = state.sessions.get(id).await.ok_or(ApiError::NotFound)?;
    let fresh = {
        let s = shared.lock().await;
        state.controller().restart(&s)?
    };
    let new_id = state.sessions.replace(id, fresh).await;
    tracing::info!(old = %id, session = %new_id, "session restarted");
    Ok(Json(SessionIdResponse { id: new_id }))
}

async fn get_catalog() -> Json<Catalog> {
    Json(catalog::catalog())
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(render_metrics))
        .route("/v1/catalog", get(get_catalog))
        .route("/v1/sessions", post(create_session).get(list_sessions))
        .route("/v1/sessions/:id", get(get_session).delete(delete_session))
        .route("/v1/sessions/:id/profile", patch(patch_profile))
        .route("/v1/sessions/:id/start", post(start_chat))
        .route("/v1/sessions/:id/messages", post(post_message))
        .route("/v1/sessions/:id/summary", post(request_summary))
        .route("/v1/sessions/:id/restart", post(restart_session))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
