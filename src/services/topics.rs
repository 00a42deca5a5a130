//! Topic CRUD with name uniqueness.

use std::sync::Arc;

use crate::cache::{ReadCache, QUESTIONS_TAG};
use crate::config::Config;
use crate::db::TopicStore;
use crate::errors::AppError;
use crate::models::{Topic, TopicPatch};
use crate::retry::{with_retry_if, RetryPolicy};

const NAME_REQUIRED: &str = "Topic name is required";
const NAME_TAKEN: &str = "Topic name must be unique";

#[derive(Clone)]
pub struct TopicService {
    store: Arc<dyn TopicStore>,
    cache: Arc<ReadCache>,
    retry: RetryPolicy,
}

impl TopicService {
    pub fn new(store: Arc<dyn TopicStore>, cache: Arc<ReadCache>, config: &Config) -> Self {
        Self {
            store,
            cache,
            retry: RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay),
        }
    }

    pub async fn list_topics(&self) -> Result<Vec<Topic>, AppError> {
        self.store.find_all().await
    }

    /// Topics whose name contains `query` case-insensitively. A blank query lists all.
    pub async fn search_topics(&self, query: &str) -> Result<Vec<Topic>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return self.store.find_all().await;
        }
        self.store.find_by_name_filter(query).await
    }

    pub async fn get_topic(&self, id: &str) -> Result<Topic, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(AppError::topic_not_found)
    }

    pub async fn create_topic(&self, name: &str) -> Result<Topic, AppError> {
        let name = valid_name(name)?;
        let store = &self.store;

        let result = with_retry_if(&self.retry, "create_topic", AppError::is_transient, move || async move {
            if store.find_by_name(name).await?.is_some() {
                return Err(AppError::Duplicate(NAME_TAKEN.to_string()));
            }
            store.create(name).await
        })
        .await;

        match result {
            Ok(topic) => {
                tracing::info!(topic_id = %topic.id, name = %topic.name, "Topic created");
                Ok(topic)
            }
            Err(e) => {
                tracing::error!(name, "Failed to create topic: {}", e);
                Err(e)
            }
        }
    }

    pub async fn rename_topic(&self, id: &str, name: &str) -> Result<Topic, AppError> {
        let name = valid_name(name)?;
        let store = &self.store;

        let result = with_retry_if(&self.retry, "rename_topic", AppError::is_transient, move || async move {
            if let Some(existing) = store.find_by_name(name).await? {
                if existing.id != id {
                    return Err(AppError::Duplicate(NAME_TAKEN.to_string()));
                }
            }
            store
                .update_by_id(id, &TopicPatch::name(name))
                .await?
                .ok_or_else(AppError::topic_not_found)
        })
        .await;

        match result {
            Ok(topic) => {
                self.cache.invalidate(QUESTIONS_TAG).await;
                tracing::info!(topic_id = id, name, "Topic renamed");
                Ok(topic)
            }
            Err(e) => {
                tracing::error!(topic_id = id, "Failed to rename topic: {}", e);
                Err(e)
            }
        }
    }

    /// Delete a topic together with its questions.
    pub async fn delete_topic(&self, id: &str) -> Result<(), AppError> {
        let store = &self.store;

        let result = with_retry_if(&self.retry, "delete_topic", AppError::is_transient, move || async move {
            if store.delete_by_id(id).await? {
                Ok(())
            } else {
                Err(AppError::topic_not_found())
            }
        })
        .await;

        match result {
            Ok(()) => {
                self.cache.invalidate(QUESTIONS_TAG).await;
                tracing::info!(topic_id = id, "Topic deleted");
                Ok(())
            }
            Err(e) => {
                tracing::error!(topic_id = id, "Failed to delete topic: {}", e);
                Err(e)
            }
        }
    }
}

fn valid_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(NAME_REQUIRED.to_string()));
    }
    Ok(name)
}
