use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Access token registered in an owner's store
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccessToken {
    pub owner_id: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub scope: Option<String>,
    pub source: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_used_at: Option<DateTime<Utc>>,
}
