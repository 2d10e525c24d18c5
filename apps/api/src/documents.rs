//! Read-only access to CV, job-posting and application records.
//!
//! Records are owned and written elsewhere; the assistant only resolves ids
//! into documents. `PgDocumentStore` is the production backend.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::ApplicationRow;
use crate::models::cv::CvRow;
use crate::models::job::JobPostingRow;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_cv(&self, user_id: Uuid, cv_id: Uuid) -> Result<Option<CvRow>, AppError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<JobPostingRow>, AppError>;

    /// Open postings, newest first.
    async fn list_open_jobs(&self, limit: i64) -> Result<Vec<JobPostingRow>, AppError>;

    /// The user's applications, most recently updated first.
    async fn list_applications(&self, user_id: Uuid) -> Result<Vec<ApplicationRow>, AppError>;

    async fn get_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
    ) -> Result<Option<ApplicationRow>, AppError>;
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get_cv(&self, user_id: Uuid, cv_id: Uuid) -> Result<Option<CvRow>, AppError> {
        let row = sqlx::query_as::<_, CvRow>(
            "SELECT id, user_id, data, updated_at FROM cvs WHERE id = $1 AND user_id = $2",
        )
        .bind(cv_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<JobPostingRow>, AppError> {
        let row = sqlx::query_as::<_, JobPostingRow>("SELECT * FROM job_postings WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_open_jobs(&self, limit: i64) -> Result<Vec<JobPostingRow>, AppError> {
        let rows = sqlx::query_as::<_, JobPostingRow>(
            "SELECT * FROM job_postings WHERE is_open ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_applications(&self, user_id: Uuid) -> Result<Vec<ApplicationRow>, AppError> {
        let rows = sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
    ) -> Result<Option<ApplicationRow>, AppError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE id = $1 AND user_id = $2",
        )
        .bind(application_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
