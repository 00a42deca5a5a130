//! Question reads and mutations within a topic.

use std::sync::Arc;

use chrono::Utc;

use crate::cache::{CachePolicy, ReadCache, QUESTIONS_TAG};
use crate::config::Config;
use crate::db::TopicStore;
use crate::errors::AppError;
use crate::models::{
    ActionState, DifficultyFilter, NewQuestion, Question, QuestionPatch, SearchParams,
    SearchResult, Topic, TopicPatch,
};
use crate::retry::{with_retry_if, RetryPolicy};
use crate::search::{self, Ranking};

/// Result cap of the cached search when the caller gives none.
pub const DEFAULT_SEARCH_LIMIT: i64 = 50;
/// Page size of the paginated search when the caller gives none.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

const DUPLICATE_QUESTION: &str = "A question with this text already exists";

/// Question operations over the topics held in a [`TopicStore`].
#[derive(Clone)]
pub struct QuestionService {
    store: Arc<dyn TopicStore>,
    cache: Arc<ReadCache>,
    retry: RetryPolicy,
    list_policy: CachePolicy,
    search_policy: CachePolicy,
}

impl QuestionService {
    pub fn new(store: Arc<dyn TopicStore>, cache: Arc<ReadCache>, config: &Config) -> Self {
        Self {
            store,
            cache,
            retry: RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay),
            list_policy: CachePolicy::question_list(config.questions_cache_ttl),
            search_policy: CachePolicy::question_search(config.search_cache_ttl),
        }
    }

    async fn load_topic(&self, topic_id: &str) -> Result<Topic, AppError> {
        self.store
            .find_by_id(topic_id)
            .await?
            .ok_or_else(AppError::topic_not_found)
    }

    // ==================== READS ====================

    /// All questions of a topic, in stored order.
    pub async fn list_questions(&self, topic_id: &str) -> Result<Vec<Question>, AppError> {
        let service = self;
        self.cache
            .cached(&self.list_policy, &[topic_id], move || async move {
                Ok(service.load_topic(topic_id).await?.questions)
            })
            .await
    }

    /// Questions matching `query` and `difficulty`, ranked by relevance.
    pub async fn search_questions(
        &self,
        topic_id: &str,
        query: &str,
        difficulty: DifficultyFilter,
        limit: Option<i64>,
    ) -> Result<Vec<Question>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let limit_key = limit.to_string();
        let params = &SearchParams::with_limit(limit)
            .query(query)
            .difficulty(difficulty);
        let service = self;

        self.cache
            .cached(
                &self.search_policy,
                &[topic_id, query, difficulty.as_str(), &limit_key],
                move || async move {
                    let topic = service.load_topic(topic_id).await?;
                    Ok(search::query(&topic.questions, params, Ranking::InputOrder).items)
                },
            )
            .await
    }

    /// One page of matching questions, newest first among equally relevant ones.
    pub async fn search_questions_paginated(
        &self,
        topic_id: &str,
        params: &SearchParams,
    ) -> Result<SearchResult<Question>, AppError> {
        let topic = self.load_topic(topic_id).await?;
        Ok(search::query(&topic.questions, params, Ranking::NewestFirst))
    }

    // ==================== MUTATIONS ====================

    /// Append a question and return the topic's full question list.
    pub async fn add_question(
        &self,
        topic_id: &str,
        new_question: NewQuestion,
    ) -> Result<Vec<Question>, AppError> {
        Ok(self.add_question_to_topic(topic_id, new_question).await?.questions)
    }

    /// Append a question and return the updated topic.
    pub async fn add_question_to_topic(
        &self,
        topic_id: &str,
        new_question: NewQuestion,
    ) -> Result<Topic, AppError> {
        let store = &self.store;
        let new_question = &new_question;

        let result = with_retry_if(&self.retry, "add_question", AppError::is_transient, move || async move {
            let topic = store
                .find_by_id(topic_id)
                .await?
                .ok_or_else(AppError::topic_not_found)?;

            let question = new_question.clone().into_question(Utc::now())?;
            if topic.questions.iter().any(|q| q.has_text(&question.question)) {
                return Err(AppError::Duplicate(DUPLICATE_QUESTION.to_string()));
            }

            let mut questions = topic.questions;
            questions.push(question);

            store
                .update_by_id(topic_id, &TopicPatch::questions(questions))
                .await?
                .ok_or_else(AppError::topic_not_found)
        })
        .await;

        match result {
            Ok(topic) => {
                self.cache.invalidate(QUESTIONS_TAG).await;
                tracing::info!(topic_id, count = topic.questions.len(), "Question added");
                Ok(topic)
            }
            Err(e) => {
                tracing::error!(topic_id, "Failed to add question: {}", e);
                Err(e)
            }
        }
    }

    /// Merge `patch` into one question and return it.
    pub async fn update_question(
        &self,
        topic_id: &str,
        question_id: &str,
        patch: QuestionPatch,
    ) -> Result<Question, AppError> {
        let store = &self.store;
        let patch = &patch;

        let result = with_retry_if(&self.retry, "update_question", AppError::is_transient, move || async move {
            let topic = store
                .find_by_id(topic_id)
                .await?
                .ok_or_else(AppError::topic_not_found)?;

            let mut questions = topic.questions;
            let index = questions
                .iter()
                .position(|q| q.id == question_id)
                .ok_or_else(AppError::question_not_found)?;

            patch.validate()?;

            if let Some(text) = &patch.question {
                let collides = questions
                    .iter()
                    .any(|q| q.id != question_id && q.has_text(text));
                if collides {
                    return Err(AppError::Duplicate(DUPLICATE_QUESTION.to_string()));
                }
            }

            let question = &mut questions[index];
            question.apply(patch);
            question.updated_at = Some(Utc::now());
            let updated = question.clone();

            store
                .update_by_id(topic_id, &TopicPatch::questions(questions))
                .await?
                .ok_or_else(AppError::topic_not_found)?;

            Ok(updated)
        })
        .await;

        match result {
            Ok(question) => {
                self.cache.invalidate(QUESTIONS_TAG).await;
                tracing::info!(topic_id, question_id, "Question updated");
                Ok(question)
            }
            Err(e) => {
                tracing::error!(topic_id, question_id, "Failed to update question: {}", e);
                Err(e)
            }
        }
    }

    /// Remove one question, reporting the outcome as an [`ActionState`].
    pub async fn delete_question(&self, topic_id: &str, question_id: &str) -> ActionState {
        match self.remove_question(topic_id, question_id).await {
            Ok(()) => ActionState::ok(),
            Err(e) => ActionState::failed(e.message()),
        }
    }

    /// Remove one question.
    pub async fn remove_question(&self, topic_id: &str, question_id: &str) -> Result<(), AppError> {
        let store = &self.store;

        let result = with_retry_if(&self.retry, "delete_question", AppError::is_transient, move || async move {
            let topic = store
                .find_by_id(topic_id)
                .await?
                .ok_or_else(AppError::topic_not_found)?;

            let mut questions = topic.questions;
            let index = questions
                .iter()
                .position(|q| q.id == question_id)
                .ok_or_else(AppError::question_not_found)?;
            questions.remove(index);

            store
                .update_by_id(topic_id, &TopicPatch::questions(questions))
                .await?
                .ok_or_else(AppError::topic_not_found)?;

            Ok(())
        })
        .await;

        match result {
            Ok(()) => {
                self.cache.invalidate(QUESTIONS_TAG).await;
                tracing::info!(topic_id, question_id, "Question deleted");
                Ok(())
            }
            Err(e) => {
                tracing::error!(topic_id, question_id, "Failed to delete question: {}", e);
                Err(e)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FlakyStore;
    use super::*;
    use crate::db::{init_database, Repository};
    use crate::models::Difficulty;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config() -> Config {
        Config {
            retry_base_delay: Duration::from_millis(1),
            ..Config::default()
        }
    }

    async fn repository() -> (Repository, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        (Repository::new(pool, Duration::from_secs(5)), dir)
    }

    async fn setup() -> (QuestionService, Arc<dyn TopicStore>, Arc<ReadCache>, TempDir) {
        let (repo, dir) = repository().await;
        let store: Arc<dyn TopicStore> = Arc::new(repo);
        let cache = Arc::new(ReadCache::new());
        let service = QuestionService::new(store.clone(), cache.clone(), &test_config());
        (service, store, cache, dir)
    }

    fn big_o() -> NewQuestion {
        NewQuestion::new("What is Big O?", "Upper bound on growth", Difficulty::Easy)
    }

    fn red_black() -> NewQuestion {
        NewQuestion::new("Explain red-black trees", "Balanced BSTs", Difficulty::Hard)
    }

    #[tokio::test]
    async fn test_algorithms_scenario() {
        let (service, store, _cache, _dir) = setup().await;
        let topic = store.create("Algorithms").await.unwrap();

        let after_first = service.add_question(&topic.id, big_o()).await.unwrap();
        assert_eq!(after_first.len(), 1);
        let first = &after_first[0];
        assert!(!first.id.is_empty());
        assert!(first.created_at.is_some());
        assert_eq!(first.created_at, first.updated_at);

        let after_second = service.add_question(&topic.id, red_black()).await.unwrap();
        assert_eq!(after_second.len(), 2);

        let hard = service
            .search_questions(&topic.id, "", DifficultyFilter::Hard, None)
            .await
            .unwrap();
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].question, "Explain red-black trees");

        let big = service
            .search_questions(&topic.id, "big o", DifficultyFilter::All, None)
            .await
            .unwrap();
        assert_eq!(big.len(), 1);
        assert_eq!(big[0].question, "What is Big O?");

        let err = service
            .add_question(
                &topic.id,
                NewQuestion::new("  WHAT IS BIG O? ", "Different answer", Difficulty::Moderate),
            )
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::Duplicate(m) if m == DUPLICATE_QUESTION));
        assert_eq!(service.list_questions(&topic.id).await.unwrap().len(), 2);

        // Removing Q1 leaves only Q2
        let state = service.delete_question(&topic.id, &first.id).await;
        assert!(state.success);
        let page = service
            .search_questions_paginated(&topic.id, &SearchParams::with_limit(DEFAULT_PAGE_SIZE))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].question, "Explain red-black trees");
        let all = service
            .search_questions(&topic.id, "", DifficultyFilter::All, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].question, "Explain red-black trees");
    }

    #[tokio::test]
    async fn test_add_then_list_includes_question_once() {
        let (service, store, _cache, _dir) = setup().await;
        let topic = store.create("Networking").await.unwrap();

        // Warm the cache before the write
        assert!(service.list_questions(&topic.id).await.unwrap().is_empty());

        service
            .add_question(&topic.id, NewQuestion::new("What is TCP?", "A transport protocol", Difficulty::Easy))
            .await
            .unwrap();

        let listed = service.list_questions(&topic.id).await.unwrap();
        let matching = listed.iter().filter(|q| q.question == "What is TCP?").count();
        assert_eq!(matching, 1);
    }

    #[tokio::test]
    async fn test_add_validation_errors() {
        let (service, store, _cache, _dir) = setup().await;
        let topic = store.create("Databases").await.unwrap();

        let cases = [
            (
                NewQuestion {
                    question: Some("   ".into()),
                    ..big_o()
                },
                "Question text is required",
            ),
            (
                NewQuestion {
                    answer: None,
                    ..big_o()
                },
                "Answer text is required",
            ),
            (
                NewQuestion {
                    difficulty: None,
                    ..big_o()
                },
                "Difficulty level is required",
            ),
        ];

        for (input, expected) in cases {
            let err = service.add_question(&topic.id, input).await.unwrap_err();
            assert!(matches!(&err, AppError::Validation(m) if m == expected), "{err}");
        }

        let err = service.add_question("missing", big_o()).await.unwrap_err();
        assert_eq!(err.message(), "Topic not found");
    }

    #[tokio::test]
    async fn test_update_question() {
        let (service, store, _cache, _dir) = setup().await;
        let topic = store.create("Algorithms").await.unwrap();
        let questions = service.add_question(&topic.id, big_o()).await.unwrap();
        let id = questions[0].id.clone();

        let patch = QuestionPatch {
            answer: Some("Asymptotic upper bound".into()),
            keywords: Some(vec!["complexity".into()]),
            ..Default::default()
        };
        let updated = service.update_question(&topic.id, &id, patch).await.unwrap();

        assert_eq!(updated.question, "What is Big O?");
        assert_eq!(updated.answer, "Asymptotic upper bound");
        assert_eq!(updated.keywords, vec!["complexity".to_string()]);
        assert!(updated.updated_at >= updated.created_at);

        // Keeping its own text is not a collision
        let same = QuestionPatch {
            question: Some("what is big o?".into()),
            ..Default::default()
        };
        assert!(service.update_question(&topic.id, &id, same).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_with_empty_question_leaves_text_unchanged() {
        let (service, store, _cache, _dir) = setup().await;
        let topic = store.create("Algorithms").await.unwrap();
        let id = service.add_question(&topic.id, big_o()).await.unwrap()[0].id.clone();

        let patch = QuestionPatch {
            question: Some("".into()),
            ..Default::default()
        };
        let err = service.update_question(&topic.id, &id, patch).await.unwrap_err();
        assert!(matches!(&err, AppError::Validation(m) if m == "Question text cannot be empty"));

        let listed = service.list_questions(&topic.id).await.unwrap();
        assert_eq!(listed[0].question, "What is Big O?");
    }

    #[tokio::test]
    async fn test_update_collision_and_missing() {
        let (service, store, _cache, _dir) = setup().await;
        let topic = store.create("Algorithms").await.unwrap();
        service.add_question(&topic.id, big_o()).await.unwrap();
        let questions = service.add_question(&topic.id, red_black()).await.unwrap();
        let second = questions[1].id.clone();

        let patch = QuestionPatch {
            question: Some("What is big o?".into()),
            ..Default::default()
        };
        let err = service
            .update_question(&topic.id, &second, patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));

        let err = service
            .update_question(&topic.id, "missing", QuestionPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Question not found");
    }

    #[tokio::test]
    async fn test_delete_reports_action_state() {
        let (service, store, _cache, _dir) = setup().await;
        let topic = store.create("Algorithms").await.unwrap();
        let id = service.add_question(&topic.id, big_o()).await.unwrap()[0].id.clone();

        assert_eq!(service.delete_question(&topic.id, &id).await, ActionState::ok());
        assert_eq!(
            service.delete_question(&topic.id, &id).await,
            ActionState::failed("Question not found")
        );
        assert_eq!(
            service.delete_question("missing", &id).await,
            ActionState::failed("Topic not found")
        );
        assert!(service.list_questions(&topic.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_invalidates_cached_reads() {
        let (service, store, cache, _dir) = setup().await;
        let topic = store.create("Algorithms").await.unwrap();
        service.add_question(&topic.id, big_o()).await.unwrap();

        service.list_questions(&topic.id).await.unwrap();
        service
            .search_questions(&topic.id, "tree", DifficultyFilter::All, None)
            .await
            .unwrap();
        assert_eq!(cache.len().await, 2);

        let found = service
            .search_questions(&topic.id, "tree", DifficultyFilter::All, None)
            .await
            .unwrap();
        assert!(found.is_empty());

        service.add_question(&topic.id, red_black()).await.unwrap();
        assert!(cache.is_empty().await);

        let found = service
            .search_questions(&topic.id, "tree", DifficultyFilter::All, None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_list_does_not_see_direct_store_writes() {
        let (service, store, _cache, _dir) = setup().await;
        let topic = store.create("Algorithms").await.unwrap();

        assert!(service.list_questions(&topic.id).await.unwrap().is_empty());

        // Bypasses the service, so nothing is invalidated
        let question = big_o().into_question(Utc::now()).unwrap();
        store
            .update_by_id(&topic.id, &TopicPatch::questions(vec![question]))
            .await
            .unwrap();

        assert!(service.list_questions(&topic.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_topic_reads_fail_and_are_not_cached() {
        let (service, _store, cache, _dir) = setup().await;

        let err = service.list_questions("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = service
            .search_questions_paginated("missing", &SearchParams::with_limit(DEFAULT_PAGE_SIZE))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_paginated_search() {
        let (service, store, _cache, _dir) = setup().await;
        let topic = store.create("Trees").await.unwrap();
        for i in 0..5 {
            service
                .add_question(
                    &topic.id,
                    NewQuestion::new(&format!("Tree question number {i}"), "Some answer", Difficulty::Moderate),
                )
                .await
                .unwrap();
        }

        let params = SearchParams::with_limit(2).query("tree").offset(2);
        let page = service
            .search_questions_paginated(&topic.id, &params)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 5);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_transient_write_failures_are_retried() {
        let (repo, _dir) = repository().await;
        let topic = repo.create("Algorithms").await.unwrap();
        let flaky = Arc::new(FlakyStore::new(repo, 2));
        let service = QuestionService::new(flaky.clone(), Arc::new(ReadCache::new()), &test_config());

        let questions = service.add_question(&topic.id, big_o()).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(flaky.writes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_ceiling() {
        let (repo, _dir) = repository().await;
        let topic = repo.create("Algorithms").await.unwrap();
        let flaky = Arc::new(FlakyStore::new(repo, 10));
        let service = QuestionService::new(flaky.clone(), Arc::new(ReadCache::new()), &test_config());

        let err = service.add_question(&topic.id, big_o()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(flaky.writes.load(Ordering::SeqCst), 3);

        let state = service.delete_question(&topic.id, "any").await;
        assert_eq!(state, ActionState::failed("Question not found"));
    }

    #[tokio::test]
    async fn test_deterministic_errors_are_not_retried() {
        let (repo, _dir) = repository().await;
        let topic = repo.create("Algorithms").await.unwrap();
        let flaky = Arc::new(FlakyStore::new(repo, 0));
        let service = QuestionService::new(flaky.clone(), Arc::new(ReadCache::new()), &test_config());

        service.add_question(&topic.id, big_o()).await.unwrap();
        let writes = flaky.writes.load(Ordering::SeqCst);

        let err = service.add_question(&topic.id, big_o()).await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
        assert_eq!(flaky.writes.load(Ordering::SeqCst), writes);
    }
}
