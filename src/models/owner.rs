use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The single owner held by one ledger store.
///
/// Amounts are in cents. `balance` is computed by the database as
/// `clv - spent` and may be negative when overdraft was allowed.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Owner {
    pub owner_id: String,
    pub owner_login: String,
    pub avatar_url: Option<String>,
    pub blog: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub twitter_username: Option<String>,
    pub source: Option<String>,
    pub is_authenticated: bool,
    pub is_sponsor: bool,
    pub clv: i64,
    pub spent: i64,
    pub balance: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Partial owner profile used by `initialize`.
///
/// Every optional field follows "supplied wins, omitted is preserved":
/// re-initializing an existing owner never resets a field the caller left out.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OwnerProfile {
    pub owner_id: String,
    pub owner_login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub twitter_username: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub is_authenticated: Option<bool>,
    #[serde(default)]
    pub is_sponsor: Option<bool>,
    #[serde(default)]
    pub clv: Option<i64>,
    #[serde(default)]
    pub spent: Option<i64>,
}

/// Body of an `initialize` call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InitializeOwner {
    pub sponsor: OwnerProfile,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl Owner {
    /// Balance in dollars, for display
    pub fn balance_dollars(&self) -> f64 {
        self.balance as f64 / 100.0
    }

    /// Whether `amount` cents can be charged without going below zero
    pub fn can_afford(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}

impl OwnerProfile {
    pub fn new(owner_id: impl Into<String>, owner_login: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            owner_login: owner_login.into(),
            ..Default::default()
        }
    }
}
