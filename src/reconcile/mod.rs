//! Optimistic question list for clients of the question API.
//!
//! A [`QuestionListView`] shows local edits before the server confirms them
//! and rolls back to the last confirmed list when the server rejects them.
//! One action may be in flight at a time:
//!
//! ```text
//! Idle --submit--> Optimistic --confirm--> Idle (displayed = server result)
//!                             --reject---> Idle (displayed = snapshot)
//! ```

use std::fmt;
use std::future::Future;

use chrono::Utc;

use crate::errors::AppError;
use crate::models::{
    ActionState, Difficulty, DifficultyFilter, NewQuestion, Question, QuestionPatch, SearchParams,
};
use crate::search::{self, Ranking};

/// Result cap applied to filtered views.
pub const VISIBLE_LIMIT: i64 = 100;

const MIN_QUESTION_CHARS: usize = 10;
const MIN_ANSWER_CHARS: usize = 5;
const TEMP_ID_PREFIX: &str = "tmp-";

/// Split comma-separated keyword input, dropping blank entries.
pub fn parse_keywords(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Raw values of the add/edit question form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionForm {
    pub question: String,
    pub answer: String,
    pub difficulty: Option<Difficulty>,
    /// Comma-separated
    pub keywords: String,
}

/// Form fields after the client-side rules passed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidForm {
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    pub keywords: Vec<String>,
}

impl QuestionForm {
    /// Apply the client-side form rules and trim the text fields.
    pub fn validate(&self) -> Result<ValidForm, String> {
        let question = self.question.trim();
        let answer = self.answer.trim();

        if question.is_empty() {
            return Err("Question is required".to_string());
        }
        if answer.is_empty() {
            return Err("Answer is required".to_string());
        }
        let Some(difficulty) = self.difficulty else {
            return Err("Difficulty is required".to_string());
        };
        if question.chars().count() < MIN_QUESTION_CHARS {
            return Err(format!(
                "Question must be at least {} characters long",
                MIN_QUESTION_CHARS
            ));
        }
        if answer.chars().count() < MIN_ANSWER_CHARS {
            return Err(format!(
                "Answer must be at least {} characters long",
                MIN_ANSWER_CHARS
            ));
        }

        Ok(ValidForm {
            question: question.to_string(),
            answer: answer.to_string(),
            difficulty,
            keywords: parse_keywords(&self.keywords),
        })
    }
}

impl From<ValidForm> for NewQuestion {
    fn from(form: ValidForm) -> Self {
        NewQuestion {
            question: Some(form.question),
            answer: Some(form.answer),
            difficulty: Some(form.difficulty),
            keywords: form.keywords,
        }
    }
}

impl From<ValidForm> for QuestionPatch {
    fn from(form: ValidForm) -> Self {
        QuestionPatch {
            question: Some(form.question),
            answer: Some(form.answer),
            difficulty: Some(form.difficulty),
            keywords: Some(form.keywords),
        }
    }
}

/// Action awaiting server confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    Add { temp_id: String },
    Update { question_id: String },
    Delete { question_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Idle,
    Optimistic {
        action: PendingAction,
        /// Confirmed list at the time the action was submitted
        snapshot: Vec<Question>,
    },
}

/// Authoritative server answer to a pending action.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// The topic's full question list after the add
    Added(Vec<Question>),
    Updated(Question),
    Deleted,
}

/// Why an action did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Another action is still awaiting the server
    Busy,
    /// Refused by the client-side rules; nothing was sent
    Invalid(String),
    /// The server rejected the action; the view was rolled back
    Rejected(String),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Busy => write!(f, "Another change is still being saved"),
            DispatchError::Invalid(msg) => write!(f, "{}", msg),
            DispatchError::Rejected(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Displayed question list of one topic with optimistic edits.
#[derive(Debug, Clone)]
pub struct QuestionListView {
    confirmed: Vec<Question>,
    displayed: Vec<Question>,
    search: String,
    difficulty: DifficultyFilter,
    error: Option<String>,
    state: ViewState,
}

impl QuestionListView {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            displayed: questions.clone(),
            confirmed: questions,
            search: String::new(),
            difficulty: DifficultyFilter::All,
            error: None,
            state: ViewState::Idle,
        }
    }

    /// List including optimistic edits, unfiltered.
    pub fn displayed(&self) -> &[Question] {
        &self.displayed
    }

    /// Last list the server confirmed.
    pub fn confirmed(&self) -> &[Question] {
        &self.confirmed
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ViewState::Optimistic { .. })
    }

    /// Message of the last rejected action.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
    }

    pub fn set_difficulty(&mut self, difficulty: DifficultyFilter) {
        self.difficulty = difficulty;
    }

    /// What the list shows: the displayed list, narrowed by the active filters.
    pub fn visible(&self) -> Vec<Question> {
        let params = SearchParams::with_limit(VISIBLE_LIMIT)
            .query(self.search.clone())
            .difficulty(self.difficulty);

        if !params.is_filtering() {
            return self.displayed.clone();
        }
        search::query(&self.displayed, &params, Ranking::InputOrder).items
    }

    // ==================== OPTIMISTIC ACTIONS ====================

    /// Validate the form and show it as a new question at the top of the list.
    pub fn begin_add(&mut self, form: &QuestionForm) -> Result<NewQuestion, DispatchError> {
        self.ensure_idle()?;
        let valid = form.validate().map_err(DispatchError::Invalid)?;

        if self.confirmed.iter().any(|q| q.has_text(&valid.question)) {
            return Err(DispatchError::Invalid(
                "A question with this text already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let temp_id = format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4());
        let placeholder = Question {
            id: temp_id.clone(),
            question: valid.question.clone(),
            answer: valid.answer.clone(),
            difficulty: valid.difficulty,
            keywords: valid.keywords.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };

        self.enter_optimistic(PendingAction::Add { temp_id });
        self.displayed.insert(0, placeholder);
        Ok(valid.into())
    }

    /// Validate the form and merge it into the question with `question_id`.
    pub fn begin_update(
        &mut self,
        question_id: &str,
        form: &QuestionForm,
    ) -> Result<QuestionPatch, DispatchError> {
        self.ensure_idle()?;
        let patch: QuestionPatch = form.validate().map_err(DispatchError::Invalid)?.into();

        if !self.displayed.iter().any(|q| q.id == question_id) {
            return Err(DispatchError::Invalid("Question not found".to_string()));
        }

        self.enter_optimistic(PendingAction::Update {
            question_id: question_id.to_string(),
        });
        if let Some(question) = self.displayed.iter_mut().find(|q| q.id == question_id) {
            question.apply(&patch);
        }
        Ok(patch)
    }

    /// Hide the question with `question_id`.
    pub fn begin_delete(&mut self, question_id: &str) -> Result<(), DispatchError> {
        self.ensure_idle()?;
        self.enter_optimistic(PendingAction::Delete {
            question_id: question_id.to_string(),
        });
        self.displayed.retain(|q| q.id != question_id);
        Ok(())
    }

    /// Adopt the server's result for the pending action. Ignored when idle.
    pub fn confirm(&mut self, confirmation: Confirmation) {
        let ViewState::Optimistic { action, snapshot } =
            std::mem::replace(&mut self.state, ViewState::Idle)
        else {
            return;
        };

        match (action, confirmation) {
            (PendingAction::Add { .. }, Confirmation::Added(questions)) => {
                self.confirmed = questions;
            }
            (PendingAction::Update { question_id }, Confirmation::Updated(updated)) => {
                let mut questions = snapshot;
                if let Some(slot) = questions.iter_mut().find(|q| q.id == question_id) {
                    *slot = updated;
                }
                self.confirmed = questions;
            }
            (PendingAction::Delete { .. }, Confirmation::Deleted) => {
                self.confirmed = self.displayed.clone();
            }
            (action, confirmation) => {
                tracing::warn!(?action, ?confirmation, "Confirmation does not match pending action");
                self.confirmed = snapshot;
            }
        }

        self.displayed = self.confirmed.clone();
    }

    /// Roll back the pending action and record `message`. Ignored when idle.
    pub fn reject(&mut self, message: impl Into<String>) {
        let ViewState::Optimistic { snapshot, .. } =
            std::mem::replace(&mut self.state, ViewState::Idle)
        else {
            return;
        };

        self.displayed = snapshot.clone();
        self.confirmed = snapshot;
        self.error = Some(message.into());
    }

    // ==================== DISPATCH ====================

    /// Run a full add cycle around `send`, which delivers the question to the server.
    pub async fn dispatch_add<F, Fut>(&mut self, form: &QuestionForm, send: F) -> Result<(), DispatchError>
    where
        F: FnOnce(NewQuestion) -> Fut,
        Fut: Future<Output = Result<Vec<Question>, AppError>>,
    {
        let new_question = self.begin_add(form)?;
        match send(new_question).await {
            Ok(questions) => {
                self.confirm(Confirmation::Added(questions));
                Ok(())
            }
            Err(e) => Err(self.rejected(e.message())),
        }
    }

    /// Run a full update cycle around `send`.
    pub async fn dispatch_update<F, Fut>(
        &mut self,
        question_id: &str,
        form: &QuestionForm,
        send: F,
    ) -> Result<(), DispatchError>
    where
        F: FnOnce(QuestionPatch) -> Fut,
        Fut: Future<Output = Result<Question, AppError>>,
    {
        let patch = self.begin_update(question_id, form)?;
        match send(patch).await {
            Ok(question) => {
                self.confirm(Confirmation::Updated(question));
                Ok(())
            }
            Err(e) => Err(self.rejected(e.message())),
        }
    }

    /// Run a full delete cycle around `send`.
    pub async fn dispatch_delete<F, Fut>(&mut self, question_id: &str, send: F) -> Result<(), DispatchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ActionState>,
    {
        self.begin_delete(question_id)?;
        let state = send().await;
        if state.success {
            self.confirm(Confirmation::Deleted);
            return Ok(());
        }
        let message = state
            .error
            .unwrap_or_else(|| "Failed to delete question".to_string());
        Err(self.rejected(message))
    }

    fn ensure_idle(&self) -> Result<(), DispatchError> {
        if self.is_pending() {
            return Err(DispatchError::Busy);
        }
        Ok(())
    }

    fn enter_optimistic(&mut self, action: PendingAction) {
        self.error = None;
        self.state = ViewState::Optimistic {
            action,
            snapshot: self.confirmed.clone(),
        };
    }

    fn rejected(&mut self, message: String) -> DispatchError {
        self.reject(message.clone());
        DispatchError::Rejected(message)
    }
}
