//! Topic model: a named collection of embedded questions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Question;

/// A topic document. Its questions live and die with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a new topic.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTopicRequest {
    #[serde(default)]
    pub name: String,
}

/// Request body for renaming a topic.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTopicRequest {
    #[serde(default)]
    pub name: String,
}

/// Fields of a topic document replaced by an update. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct TopicPatch {
    pub name: Option<String>,
    pub questions: Option<Vec<Question>>,
}

impl TopicPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            questions: None,
        }
    }

    pub fn questions(questions: Vec<Question>) -> Self {
        Self {
            name: None,
            questions: Some(questions),
        }
    }
}
