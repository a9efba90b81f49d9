//! Route table and middleware.
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use perspec_config::ServerConfig;
use perspec_pipeline::Orchestrator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/tweets/question", post(handlers::question))
        .route("/tweets/question/first", post(handlers::question_first))
        .route("/tweets/question/third", post(handlers::question_third))
        .route("/tweets/question/dual", post(handlers::question_dual))
        .route("/tweets/analyze", post(handlers::analyze))
        .route("/tweets/analyze/search", post(handlers::analyze_search))
        .route("/tweets/users", post(handlers::users))
        .route("/users/:username", get(handlers::profile))
        .route("/users/:username/analysis", get(handlers::personality))
        .route("/users/:username/community", get(handlers::community));

    let app = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http());

    if server.cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}
