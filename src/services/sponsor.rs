use serde::Serialize;
use sqlx::PgPool;

use crate::auth::{generate_idempotency_key, SponsorCredentials};
use crate::config::BillingConfig;
use crate::error::AppResult;
use crate::models::{NewCharge, Owner};
use crate::services::LedgerService;

/// What a request wants to be charged, decided by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChargePolicy {
    /// Cents to charge, `None` for a plain lookup
    pub charge: Option<i64>,
    /// If true, `spent` may exceed `clv`
    pub allow_negative_clv: bool,
}

/// Sponsor view returned to the request boundary.
///
/// `owner` is the latest known snapshot: when a charge is applied its result
/// replaces the snapshot read by `verify`.
#[derive(Debug, Clone, Serialize)]
pub struct SponsorStatus {
    pub is_authenticated: bool,
    /// True only when a charge was added to `spent` by this call
    pub charged: bool,
    pub owner: Option<Owner>,
    /// Dollars
    pub balance: f64,
    pub scope: Option<String>,
}

impl ChargePolicy {
    pub fn lookup() -> Self {
        Self::default()
    }

    pub fn from_config(config: &BillingConfig) -> Self {
        Self {
            charge: Some(config.charge_per_request_cents).filter(|c| *c > 0),
            allow_negative_clv: config.allow_negative_balance,
        }
    }
}

impl SponsorStatus {
    fn anonymous(scope: Option<String>) -> Self {
        Self {
            is_authenticated: false,
            charged: false,
            owner: None,
            balance: 0.0,
            scope,
        }
    }

    fn authenticated(owner: Owner, charged: bool, scope: Option<String>) -> Self {
        Self {
            is_authenticated: true,
            charged,
            balance: owner.balance_dollars(),
            owner: Some(owner),
            scope,
        }
    }
}

pub struct SponsorService;

impl SponsorService {
    /// Resolves the sponsor behind `credentials` and applies `policy`.
    ///
    /// Missing or unknown credentials yield an unauthenticated status rather
    /// than an error; storage failures propagate. With overdraft disallowed a
    /// charge larger than the balance is skipped and reported as
    /// `charged = false`.
    pub async fn get_sponsor(
        pool: &PgPool,
        credentials: &SponsorCredentials,
        policy: ChargePolicy,
        source: Option<&str>,
    ) -> AppResult<SponsorStatus> {
        let scope = credentials.scope.clone();

        let Some((owner_id, token)) = credentials.identity() else {
            return Ok(SponsorStatus::anonymous(scope));
        };

        let owner = match LedgerService::verify(pool, owner_id, token).await {
            Ok(owner) => owner,
            Err(e) if e.is_identity_miss() => {
                log::debug!("Sponsor lookup for {} failed: {}", owner_id, e);
                return Ok(SponsorStatus::anonymous(scope));
            }
            Err(e) => return Err(e),
        };

        let Some(amount) = policy.charge.filter(|a| *a > 0) else {
            return Ok(SponsorStatus::authenticated(owner, false, scope));
        };

        if !policy.allow_negative_clv && !owner.can_afford(amount) {
            log::info!(
                "Not charging owner {} {} cents: balance {} is insufficient",
                owner_id,
                amount,
                owner.balance
            );
            return Ok(SponsorStatus::authenticated(owner, false, scope));
        }

        let outcome = LedgerService::charge(
            pool,
            owner_id,
            NewCharge {
                amount,
                idempotency_key: generate_idempotency_key(),
                source: source.map(|s| s.to_string()),
            },
        )
        .await?;

        Ok(SponsorStatus::authenticated(
            outcome.owner,
            outcome.applied,
            scope,
        ))
    }
}
