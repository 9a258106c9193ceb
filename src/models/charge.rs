use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Owner;

/// A recorded charge. `id` is the caller's idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Charge {
    pub owner_id: String,
    pub id: String,
    pub amount: i64,
    pub source: Option<String>,
    #[sqlx(rename = "charged_at")]
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Input for a charge
#[derive(Debug, Clone, Deserialize)]
pub struct NewCharge {
    pub amount: i64,
    pub idempotency_key: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// Result of a charge call.
///
/// `applied` is false when the idempotency key had already been used: the
/// owner is returned as it currently is and `charge` is the original record.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeOutcome {
    pub owner: Owner,
    pub charge: Charge,
    pub applied: bool,
}
