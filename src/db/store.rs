//! Datastore gateway abstraction.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{Topic, TopicPatch};

/// Document store holding topics with their embedded questions.
///
/// Every call is bounded by the implementation's timeout. Timeouts and
/// connection failures surface as [`AppError::DatastoreTransient`].
#[async_trait]
pub trait TopicStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Topic>, AppError>;

    async fn find_all(&self) -> Result<Vec<Topic>, AppError>;

    /// Topics whose name contains `pattern`, compared case-insensitively.
    async fn find_by_name_filter(&self, pattern: &str) -> Result<Vec<Topic>, AppError>;

    /// The topic with exactly this name, if any.
    async fn find_by_name(&self, name: &str) -> Result<Option<Topic>, AppError>;

    async fn create(&self, name: &str) -> Result<Topic, AppError>;

    /// Apply `patch` and bump `updated_at`. `None` if the topic does not exist.
    async fn update_by_id(&self, id: &str, patch: &TopicPatch) -> Result<Option<Topic>, AppError>;

    /// Remove the topic and its questions. `false` if it did not exist.
    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError>;
}
