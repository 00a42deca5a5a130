//! Question Bank Backend
//!
//! A REST backend for topics and their questions, with SQLite persistence,
//! a tag-invalidated read cache and retry around transient datastore errors.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod reconcile;
pub mod retry;
pub mod search;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{get, patch},
    Router,
};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cache::ReadCache;
use config::Config;
use db::{Repository, TopicStore};
use services::{QuestionService, TopicService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub topics: TopicService,
    pub questions: QuestionService,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the services over `pool` with a fresh read cache.
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let store: Arc<dyn TopicStore> = Arc::new(Repository::new(pool, config.db_timeout));
        let cache = Arc::new(ReadCache::new());

        Self {
            topics: TopicService::new(store.clone(), cache.clone(), &config),
            questions: QuestionService::new(store, cache, &config),
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Topics
        .route("/topics", get(api::list_topics).post(api::create_topic))
        .route(
            "/topics/{id}",
            get(api::get_topic)
                .patch(api::update_topic)
                .delete(api::delete_topic),
        )
        // Questions
        .route(
            "/topics/{id}/questions",
            get(api::list_questions).post(api::add_question),
        )
        .route("/topics/{id}/questions/search", get(api::search_questions))
        .route(
            "/topics/{id}/questions/{question_id}",
            patch(api::update_question).delete(api::delete_question),
        );

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
