pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::practice::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Practice Session API
        .route(
            "/api/v1/practice/sessions",
            post(handlers::handle_create_session),
        )
        .route(
            "/api/v1/practice/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_exit),
        )
        .route(
            "/api/v1/practice/sessions/:id/start",
            post(handlers::handle_start),
        )
        .route(
            "/api/v1/practice/sessions/:id/pause",
            post(handlers::handle_pause),
        )
        .route(
            "/api/v1/practice/sessions/:id/resume",
            post(handlers::handle_resume),
        )
        .route(
            "/api/v1/practice/sessions/:id/next",
            post(handlers::handle_next),
        )
        .route(
            "/api/v1/practice/sessions/:id/previous",
            post(handlers::handle_previous),
        )
        .route(
            "/api/v1/practice/sessions/:id/jump",
            post(handlers::handle_jump),
        )
        .route(
            "/api/v1/practice/sessions/:id/answers/:question_id",
            get(handlers::handle_get_answer).put(handlers::handle_put_answer),
        )
        .route(
            "/api/v1/practice/sessions/:id/recording/audio",
            post(handlers::handle_toggle_audio),
        )
        .route(
            "/api/v1/practice/sessions/:id/recording/video",
            post(handlers::handle_toggle_video),
        )
        .route(
            "/api/v1/practice/sessions/:id/finish",
            post(handlers::handle_finish),
        )
        .route(
            "/api/v1/practice/sessions/:id/scorecard",
            get(handlers::handle_get_scorecard),
        )
        .with_state(state)
}
