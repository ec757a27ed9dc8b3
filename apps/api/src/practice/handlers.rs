//! Axum route handlers for the Practice Session API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::practice::models::{Response, Scorecard, SessionConfig};
use crate::practice::runtime::{NavigationResult, SessionHandle};
use crate::practice::session::{FinalizeOutcome, SessionController, SessionView, Step};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Missing fields deserialize as blank so validation reports them uniformly.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub session_type: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session: SessionView,
    pub used_fallback: bool,
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub record: bool,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session: SessionView,
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub response: Response,
    pub completion_ratio: f64,
}

#[derive(Debug, Serialize)]
pub struct StoredAnswer {
    pub question_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub step: Step,
    pub session: SessionView,
    pub scorecard: Option<Scorecard>,
    pub persistence_warning: Option<String>,
}

impl From<NavigationResult> for NavigationResponse {
    fn from(nav: NavigationResult) -> Self {
        let (scorecard, persistence_warning) = match nav.completion {
            Some(FinalizeOutcome {
                scorecard,
                persistence_warning,
                ..
            }) => (Some(scorecard), persistence_warning),
            None => (None, None),
        };
        Self {
            step: nav.step,
            session: nav.session,
            scorecard,
            persistence_warning,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FinishResponse {
    pub session: SessionView,
    pub scorecard: Scorecard,
    pub duration_minutes: u32,
    pub persistence_warning: Option<String>,
}

/// Upper bound on a single typed answer.
const MAX_ANSWER_CHARS: usize = 10_000;

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

async fn find(state: &AppState, id: Uuid) -> Result<SessionHandle, AppError> {
    state
        .registry
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Practice session {id} not found")))
}

/// POST /api/v1/practice/sessions
///
/// Validates the config and builds the question deck. The session starts in
/// `configuring`; a generation failure only produces a notice.
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    if request.user_id.is_nil() {
        return Err(AppError::Validation("user_id must not be nil".to_string()));
    }
    state.registry.ensure_can_open(request.user_id).await?;

    let config = SessionConfig {
        job_title: request.job_title,
        industry: request.industry,
        difficulty: request.difficulty,
        language: request.language,
        session_type: request.session_type,
    };
    let generated = state.configurator.generate(request.user_id, config).await?;

    let controller = SessionController::new(generated.session, state.services.clone());
    let handle = state.registry.insert(controller).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session: handle.view().await,
            used_fallback: generated.used_fallback,
            notice: generated.notice,
        }),
    ))
}

/// GET /api/v1/practice/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(find(&state, id).await?.view().await))
}

/// POST /api/v1/practice/sessions/:id/start
///
/// Body is optional; `{"record": true}` also tries to open the capture device.
pub async fn handle_start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    request: Option<Json<StartRequest>>,
) -> Result<Json<StartResponse>, AppError> {
    let record = request.map(|Json(r)| r.record).unwrap_or(false);
    let (session, notice) = find(&state, id).await?.start(record).await?;
    Ok(Json(StartResponse { session, notice }))
}

/// POST /api/v1/practice/sessions/:id/pause
pub async fn handle_pause(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(find(&state, id).await?.pause().await?))
}

/// POST /api/v1/practice/sessions/:id/resume
pub async fn handle_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(find(&state, id).await?.resume().await?))
}

/// POST /api/v1/practice/sessions/:id/next
///
/// Advancing past the last question completes the session and returns the scorecard.
pub async fn handle_next(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NavigationResponse>, AppError> {
    let nav = find(&state, id).await?.advance().await?;
    Ok(Json(nav.into()))
}

/// POST /api/v1/practice/sessions/:id/previous
pub async fn handle_previous(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NavigationResponse>, AppError> {
    let nav = find(&state, id).await?.retreat().await?;
    Ok(Json(nav.into()))
}

/// POST /api/v1/practice/sessions/:id/jump
pub async fn handle_jump(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<JumpRequest>,
) -> Result<Json<NavigationResponse>, AppError> {
    let nav = find(&state, id).await?.jump_to(request.index).await?;
    Ok(Json(nav.into()))
}

/// PUT /api/v1/practice/sessions/:id/answers/:question_id
pub async fn handle_put_answer(
    State(state): State<AppState>,
    Path((id, question_id)): Path<(Uuid, String)>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    if request.text.chars().count() > MAX_ANSWER_CHARS {
        return Err(AppError::Validation(format!(
            "Answer exceeds {MAX_ANSWER_CHARS} characters"
        )));
    }
    let handle = find(&state, id).await?;
    let response = handle.set_answer(&question_id, &request.text).await?;
    let completion_ratio = handle.view().await.completion_ratio;
    Ok(Json(AnswerResponse {
        response,
        completion_ratio,
    }))
}

/// GET /api/v1/practice/sessions/:id/answers/:question_id
pub async fn handle_get_answer(
    State(state): State<AppState>,
    Path((id, question_id)): Path<(Uuid, String)>,
) -> Result<Json<StoredAnswer>, AppError> {
    let text = find(&state, id).await?.get_answer(&question_id).await;
    Ok(Json(StoredAnswer { question_id, text }))
}

/// POST /api/v1/practice/sessions/:id/recording/audio
pub async fn handle_toggle_audio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(find(&state, id).await?.toggle_audio().await?))
}

/// POST /api/v1/practice/sessions/:id/recording/video
pub async fn handle_toggle_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(find(&state, id).await?.toggle_video().await?))
}

/// POST /api/v1/practice/sessions/:id/finish
///
/// Forced completion. Repeat calls return the same scorecard.
pub async fn handle_finish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinishResponse>, AppError> {
    let handle = find(&state, id).await?;
    let outcome = handle.finish().await?;
    Ok(Json(FinishResponse {
        session: handle.view().await,
        duration_minutes: outcome.record.duration_minutes,
        scorecard: outcome.scorecard,
        persistence_warning: outcome.persistence_warning,
    }))
}

/// GET /api/v1/practice/sessions/:id/scorecard
pub async fn handle_get_scorecard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Scorecard>, AppError> {
    find(&state, id)
        .await?
        .scorecard()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Session {id} has no scorecard yet")))
}

/// DELETE /api/v1/practice/sessions/:id
///
/// Exits the session: timer and capture device are released, nothing is
/// persisted, and the session leaves memory.
pub async fn handle_exit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = find(&state, id).await?;
    let view = handle.exit().await?;
    state.registry.remove(id).await;
    Ok(Json(view))
}
