//! Question model and its add/update payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Difficulty level of a question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "moderate" => Some(Difficulty::Moderate),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// A single prompt/answer record embedded in a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Question {
    /// Whether this question's text equals `text` ignoring case and surrounding whitespace.
    pub fn has_text(&self, text: &str) -> bool {
        normalize_text(&self.question) == normalize_text(text)
    }

    /// Merge the present fields of `patch` into this question.
    pub fn apply(&mut self, patch: &QuestionPatch) {
        if let Some(question) = &patch.question {
            self.question = question.clone();
        }
        if let Some(answer) = &patch.answer {
            self.answer = answer.clone();
        }
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(keywords) = &patch.keywords {
            self.keywords = keywords.clone();
        }
    }
}

/// Comparison form used by the duplicate check.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Request body for adding a question to a topic.
///
/// Every field is optional on the wire so a missing field is reported as a
/// validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl NewQuestion {
    pub fn new(question: &str, answer: &str, difficulty: Difficulty) -> Self {
        Self {
            question: Some(question.to_string()),
            answer: Some(answer.to_string()),
            difficulty: Some(difficulty),
            keywords: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Check required fields and build the stored question.
    pub fn into_question(self, now: DateTime<Utc>) -> Result<Question, AppError> {
        let question = self
            .question
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Question text is required".to_string()))?;
        let answer = self
            .answer
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Answer text is required".to_string()))?;
        let difficulty = self
            .difficulty
            .ok_or_else(|| AppError::Validation("Difficulty level is required".to_string()))?;

        Ok(Question {
            id: uuid::Uuid::new_v4().to_string(),
            question,
            answer,
            difficulty,
            keywords: self.keywords,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }
}

/// Partial update of a question. Absent (or null) fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

impl QuestionPatch {
    /// Reject fields that are present but blank.
    pub fn validate(&self) -> Result<(), AppError> {
        if matches!(&self.question, Some(q) if q.trim().is_empty()) {
            return Err(AppError::Validation(
                "Question text cannot be empty".to_string(),
            ));
        }
        if matches!(&self.answer, Some(a) if a.trim().is_empty()) {
            return Err(AppError::Validation(
                "Answer text cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result value of operations that report failure instead of returning an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionState {
    pub success: bool,
    pub error: Option<String>,
}

impl ActionState {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}
