//! Question API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::{created, error, success, ApiResult, AppJson};
use crate::errors::AppError;
use crate::models::{
    ActionState, DifficultyFilter, NewQuestion, Question, QuestionPatch, SearchParams,
    SearchResult, Topic,
};
use crate::services::DEFAULT_PAGE_SIZE;
use crate::AppState;

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: i64 = 100;

/// Question search query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionQuery {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl QuestionQuery {
    fn text(&self) -> &str {
        self.query.as_deref().unwrap_or_default()
    }

    fn difficulty(&self) -> DifficultyFilter {
        self.difficulty
            .as_deref()
            .map(DifficultyFilter::parse)
            .unwrap_or_default()
    }

    fn is_filtering(&self) -> bool {
        !self.text().trim().is_empty()
            || self.difficulty() != DifficultyFilter::All
            || self.limit.is_some()
    }
}

fn capped(limit: i64) -> i64 {
    limit.min(MAX_SEARCH_LIMIT)
}

/// GET /api/topics/:id/questions - List a topic's questions.
///
/// Without parameters the full cached list is returned; with a query,
/// difficulty or limit the cached relevance search runs instead.
pub async fn list_questions(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Query(params): Query<QuestionQuery>,
) -> ApiResult<Vec<Question>> {
    let result = if params.is_filtering() {
        state
            .questions
            .search_questions(
                &topic_id,
                params.text(),
                params.difficulty(),
                params.limit.map(capped),
            )
            .await
    } else {
        state.questions.list_questions(&topic_id).await
    };

    match result {
        Ok(questions) => success(questions),
        Err(e) => error(e),
    }
}

/// GET /api/topics/:id/questions/search - One page of matching questions.
pub async fn search_questions(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    Query(params): Query<QuestionQuery>,
) -> ApiResult<SearchResult<Question>> {
    let search = SearchParams::with_limit(capped(params.limit.unwrap_or(DEFAULT_PAGE_SIZE)))
        .query(params.text())
        .difficulty(params.difficulty())
        .offset(params.offset.unwrap_or(0));

    match state
        .questions
        .search_questions_paginated(&topic_id, &search)
        .await
    {
        Ok(page) => success(page),
        Err(e) => error(e),
    }
}

/// POST /api/topics/:id/questions - Add a question.
pub async fn add_question(
    State(state): State<AppState>,
    Path(topic_id): Path<String>,
    AppJson(request): AppJson<NewQuestion>,
) -> ApiResult<Topic> {
    match state
        .questions
        .add_question_to_topic(&topic_id, request)
        .await
    {
        Ok(topic) => created(topic),
        Err(e) => error(e),
    }
}

/// PATCH /api/topics/:id/questions/:qid - Update some fields of a question.
pub async fn update_question(
    State(state): State<AppState>,
    Path((topic_id, question_id)): Path<(String, String)>,
    AppJson(patch): AppJson<QuestionPatch>,
) -> ApiResult<Question> {
    match state
        .questions
        .update_question(&topic_id, &question_id, patch)
        .await
    {
        Ok(question) => success(question),
        Err(e) => error(e),
    }
}

/// DELETE /api/topics/:id/questions/:qid - Delete a question.
///
/// Always answers with an [`ActionState`]; the status reflects the failure kind.
pub async fn delete_question(
    State(state): State<AppState>,
    Path((topic_id, question_id)): Path<(String, String)>,
) -> Response {
    match state
        .questions
        .remove_question(&topic_id, &question_id)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(ActionState::ok())).into_response(),
        Err(e) => {
            let message = match &e {
                AppError::Internal(_) => "Failed to delete question".to_string(),
                other => other.message(),
            };
            (e.status_code(), Json(ActionState::failed(message))).into_response()
        }
    }
}
