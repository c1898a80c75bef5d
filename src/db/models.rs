use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActivityRow {
    pub id: i64,
    pub action: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ActivityInsert {
    pub action: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityInsert {
    pub fn now(action: &str, detail: &str) -> Self {
        ActivityInsert {
            action: action.to_string(),
            detail: detail.to_string(),
            created_at: Utc::now(),
        }
    }
}
