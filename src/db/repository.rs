//! SQLite implementation of [`TopicStore`].
//!
//! Questions are embedded in their topic row as a JSON array, so every write
//! replaces the whole document. Each call is bounded by a timeout.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::TopicStore;
use crate::errors::{AppError, DatastoreFailure};
use crate::models::{Question, Topic, TopicPatch};

const TOPIC_COLUMNS: &str = "id, name, questions, created_at, updated_at";

/// Database repository for topic documents.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    timeout: Duration,
}

impl Repository {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Run `call`, failing with a transient timeout if it takes too long.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Datastore call timed out"
                );
                Err(AppError::DatastoreTransient {
                    kind: DatastoreFailure::Timeout,
                    message: format!(
                        "Datastore {} timed out after {}ms",
                        operation,
                        self.timeout.as_millis()
                    ),
                })
            }
        }
    }

    async fn fetch_one_by_id(&self, id: &str) -> Result<Option<Topic>, AppError> {
        let sql = format!("SELECT {} FROM topics WHERE id = ?", TOPIC_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(topic_from_row).transpose()
    }
}

#[async_trait]
impl TopicStore for Repository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Topic>, AppError> {
        self.bounded("find_by_id", self.fetch_one_by_id(id)).await
    }

    async fn find_all(&self) -> Result<Vec<Topic>, AppError> {
        self.bounded("find_all", async {
            let sql = format!(
                "SELECT {} FROM topics ORDER BY created_at, rowid",
                TOPIC_COLUMNS
            );
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
            rows.iter().map(topic_from_row).collect()
        })
        .await
    }

    async fn find_by_name_filter(&self, pattern: &str) -> Result<Vec<Topic>, AppError> {
        // instr() takes the pattern literally, unlike LIKE.
        let needle = pattern.to_lowercase();
        self.bounded("find_by_name_filter", async {
            let sql = format!(
                "SELECT {} FROM topics WHERE instr(lower(name), ?) > 0 ORDER BY created_at, rowid",
                TOPIC_COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(&needle)
                .fetch_all(&self.pool)
                .await?;
            rows.iter().map(topic_from_row).collect()
        })
        .await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Topic>, AppError> {
        self.bounded("find_by_name", async {
            let sql = format!("SELECT {} FROM topics WHERE name = ?", TOPIC_COLUMNS);
            let row = sqlx::query(&sql)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
            row.as_ref().map(topic_from_row).transpose()
        })
        .await
    }

    async fn create(&self, name: &str) -> Result<Topic, AppError> {
        self.bounded("create", async {
            let now = Utc::now();
            let topic = Topic {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                questions: Vec::new(),
                created_at: now,
                updated_at: now,
            };

            sqlx::query(
                "INSERT INTO topics (id, name, questions, created_at, updated_at) VALUES (?, ?, '[]', ?, ?)",
            )
            .bind(&topic.id)
            .bind(&topic.name)
            .bind(now.to_rfc3339())
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

            Ok(topic)
        })
        .await
    }

    async fn update_by_id(&self, id: &str, patch: &TopicPatch) -> Result<Option<Topic>, AppError> {
        self.bounded("update_by_id", async {
            let Some(mut topic) = self.fetch_one_by_id(id).await? else {
                return Ok(None);
            };

            if let Some(name) = &patch.name {
                topic.name = name.clone();
            }
            if let Some(questions) = &patch.questions {
                topic.questions = questions.clone();
            }
            topic.updated_at = Utc::now();

            let questions_json = serde_json::to_string(&topic.questions)
                .map_err(|e| AppError::Internal(format!("Failed to encode questions: {}", e)))?;

            let result = sqlx::query(
                "UPDATE topics SET name = ?, questions = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&topic.name)
            .bind(&questions_json)
            .bind(topic.updated_at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                // Deleted between the read and the write
                return Ok(None);
            }

            Ok(Some(topic))
        })
        .await
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, AppError> {
        self.bounded("delete_by_id", async {
            let result = sqlx::query("DELETE FROM topics WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}

/// Unique-name violations become [`AppError::Duplicate`]; everything else is classified as usual.
fn map_write_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Duplicate("Topic name must be unique".to_string())
        }
        _ => err.into(),
    }
}

// Helper functions for row conversion

fn topic_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Topic, AppError> {
    let questions_json: String = row.try_get("questions")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let questions: Vec<Question> = serde_json::from_str(&questions_json)
        .map_err(|e| AppError::Database(format!("Corrupt questions column: {}", e)))?;

    Ok(Topic {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        questions,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Invalid timestamp '{}': {}", s, e)))
}
