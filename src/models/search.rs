//! Search parameters and result shapes for question queries.

use serde::{Deserialize, Serialize};

use super::Difficulty;

/// Difficulty filter; `All` disables filtering.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum DifficultyFilter {
    #[default]
    All,
    Easy,
    Moderate,
    Hard,
}

impl DifficultyFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyFilter::All => "all",
            DifficultyFilter::Easy => "easy",
            DifficultyFilter::Moderate => "moderate",
            DifficultyFilter::Hard => "hard",
        }
    }

    /// Parse a filter value. Unrecognized values mean no filter.
    pub fn parse(s: &str) -> Self {
        match Difficulty::parse(&s.trim().to_lowercase()) {
            Some(difficulty) => difficulty.into(),
            None => DifficultyFilter::All,
        }
    }

    pub fn matches(&self, difficulty: Difficulty) -> bool {
        match self {
            DifficultyFilter::All => true,
            DifficultyFilter::Easy => difficulty == Difficulty::Easy,
            DifficultyFilter::Moderate => difficulty == Difficulty::Moderate,
            DifficultyFilter::Hard => difficulty == Difficulty::Hard,
        }
    }
}

impl From<Difficulty> for DifficultyFilter {
    fn from(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => DifficultyFilter::Easy,
            Difficulty::Moderate => DifficultyFilter::Moderate,
            Difficulty::Hard => DifficultyFilter::Hard,
        }
    }
}

impl From<String> for DifficultyFilter {
    fn from(s: String) -> Self {
        DifficultyFilter::parse(&s)
    }
}

/// Filter, search and pagination parameters for a question query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub difficulty: DifficultyFilter,
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl SearchParams {
    /// Unfiltered parameters returning the first `limit` questions.
    pub fn with_limit(limit: i64) -> Self {
        Self {
            query: String::new(),
            difficulty: DifficultyFilter::All,
            limit,
            offset: 0,
        }
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn difficulty(mut self, difficulty: impl Into<DifficultyFilter>) -> Self {
        self.difficulty = difficulty.into();
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Whether a text or difficulty filter narrows the list.
    pub fn is_filtering(&self) -> bool {
        !self.query.trim().is_empty() || self.difficulty != DifficultyFilter::All
    }
}

/// One page of a filtered question list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    pub items: Vec<T>,
    /// Count after filtering, before pagination
    pub total: usize,
    pub has_more: bool,
}

impl<T> SearchResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            has_more: false,
        }
    }
}
