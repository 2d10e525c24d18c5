use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored CV document. `data` keeps whatever shape the editor saved; it is
/// only ever interpreted through `cv::normalize`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}
