//! Topic API endpoints.

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::{created, error, success, ApiResult, AppJson};
use crate::models::{CreateTopicRequest, Topic, UpdateTopicRequest};
use crate::AppState;

/// Topic list query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct TopicListQuery {
    /// Case-insensitive name filter.
    #[serde(default)]
    pub q: Option<String>,
}

/// GET /api/topics - List topics, optionally filtered by name.
pub async fn list_topics(
    State(state): State<AppState>,
    Query(params): Query<TopicListQuery>,
) -> ApiResult<Vec<Topic>> {
    let result = match params.q.as_deref() {
        Some(q) => state.topics.search_topics(q).await,
        None => state.topics.list_topics().await,
    };

    match result {
        Ok(topics) => success(topics),
        Err(e) => error(e),
    }
}

/// GET /api/topics/:id - Get a single topic.
pub async fn get_topic(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Topic> {
    match state.topics.get_topic(&id).await {
        Ok(topic) => success(topic),
        Err(e) => error(e),
    }
}

/// POST /api/topics - Create a new topic.
pub async fn create_topic(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateTopicRequest>,
) -> ApiResult<Topic> {
    match state.topics.create_topic(&request.name).await {
        Ok(topic) => created(topic),
        Err(e) => error(e),
    }
}

/// PATCH /api/topics/:id - Rename a topic.
pub async fn update_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(request): AppJson<UpdateTopicRequest>,
) -> ApiResult<Topic> {
    match state.topics.rename_topic(&id, &request.name).await {
        Ok(topic) => success(topic),
        Err(e) => error(e),
    }
}

/// DELETE /api/topics/:id - Delete a topic and its questions.
pub async fn delete_topic(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    match state.topics.delete_topic(&id).await {
        Ok(()) => success(()),
        Err(e) => error(e),
    }
}
