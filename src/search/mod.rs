//! Question query engine.
//!
//! Filters a topic's question list by difficulty and by case-insensitive
//! substring match on question, answer and keywords, ranks the matches and
//! slices one page out of them. Everything here is pure and runs over
//! in-memory data.

use std::cmp::Ordering;

use crate::models::{Question, SearchParams, SearchResult};

/// How equally relevant matches are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    /// Keep the input order.
    InputOrder,
    /// Newest `createdAt` first; questions without a timestamp sort last.
    NewestFirst,
}

/// Run a question query.
pub fn query(questions: &[Question], params: &SearchParams, ranking: Ranking) -> SearchResult<Question> {
    if questions.is_empty() {
        return SearchResult::empty();
    }

    let term = params.query.trim().to_lowercase();

    let mut filtered: Vec<&Question> = questions
        .iter()
        .filter(|q| params.difficulty.matches(q.difficulty))
        .filter(|q| term.is_empty() || matches_term(q, &term))
        .collect();

    // `sort_by` is stable, so equal keys keep their input order.
    match (term.is_empty(), ranking) {
        (true, Ranking::InputOrder) => {}
        (true, Ranking::NewestFirst) => filtered.sort_by(|a, b| newest_first(a, b)),
        (false, Ranking::InputOrder) => filtered.sort_by(|a, b| by_relevance(a, b, &term)),
        (false, Ranking::NewestFirst) => {
            filtered.sort_by(|a, b| by_relevance(a, b, &term).then_with(|| newest_first(a, b)))
        }
    }

    paginate(&filtered, params)
}

fn matches_term(question: &Question, term: &str) -> bool {
    contains(&question.question, term)
        || contains(&question.answer, term)
        || question.keywords.iter().any(|k| contains(k, term))
}

fn contains(haystack: &str, term: &str) -> bool {
    haystack.to_lowercase().contains(term)
}

/// Question-text matches first, then answer-text matches.
fn by_relevance(a: &Question, b: &Question, term: &str) -> Ordering {
    let a_question = contains(&a.question, term);
    let b_question = contains(&b.question, term);
    let a_answer = contains(&a.answer, term);
    let b_answer = contains(&b.answer, term);

    b_question.cmp(&a_question).then(b_answer.cmp(&a_answer))
}

fn newest_first(a: &Question, b: &Question) -> Ordering {
    created_millis(b).cmp(&created_millis(a))
}

fn created_millis(question: &Question) -> i64 {
    question
        .created_at
        .map(|t| t.timestamp_millis())
        .unwrap_or(0)
}

fn paginate(filtered: &[&Question], params: &SearchParams) -> SearchResult<Question> {
    let total = filtered.len();
    let offset = usize::try_from(params.offset.max(0)).unwrap_or(usize::MAX);
    let limit = usize::try_from(params.limit.max(0)).unwrap_or(usize::MAX);

    let items = filtered
        .iter()
        .skip(offset)
        .take(limit)
        .map(|q| (*q).clone())
        .collect();

    SearchResult {
        items,
        total,
        has_more: offset.saturating_add(limit) < total,
    }
}
