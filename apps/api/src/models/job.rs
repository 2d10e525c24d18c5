use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::conversation::TargetJob;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPostingRow {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub description: String,
    pub url: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub remote: Option<bool>,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
}

impl JobPostingRow {
    pub fn to_target_job(&self) -> TargetJob {
        TargetJob {
            title: self.title.clone(),
            company: self.company.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            location: self.location.clone(),
            salary: self.salary.clone(),
            remote: self.remote,
        }
    }
}
