use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::db::{self, LockNamespace};
use crate::error::{AppError, AppResult};
use crate::models::{
    AccessToken, Charge, ChargeOutcome, InitializeOwner, NewCharge, Owner, UsageEntry,
};
use crate::services::usage::aggregate_usage;

/// Per-owner ledger.
///
/// Each owner id addresses an isolated store (its owner row, tokens and
/// charges). Every operation runs in one transaction holding the owner's
/// advisory lock, so operations on the same owner are applied one at a time
/// and the read-modify-write on `spent` needs no further guarding.
pub struct LedgerService;

impl LedgerService {
    /// Creates or updates the owner and optionally registers an access token
    pub async fn initialize(
        pool: &PgPool,
        owner_id: &str,
        input: InitializeOwner,
    ) -> AppResult<Owner> {
        let profile = input.sponsor;

        if profile.owner_id != owner_id {
            return Err(AppError::InvalidArgument(format!(
                "Profile owner_id {} does not match store {}",
                profile.owner_id, owner_id
            )));
        }
        if profile.owner_login.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "owner_login is required".to_string(),
            ));
        }
        if profile.clv.is_some_and(|v| v < 0) || profile.spent.is_some_and(|v| v < 0) {
            return Err(AppError::InvalidArgument(
                "clv and spent cannot be negative".to_string(),
            ));
        }

        let source = profile.source.clone().or_else(|| input.source.clone());
        let access_token = input.access_token.as_deref().filter(|t| !t.is_empty());

        let mut tx = db::begin_keyed(pool, LockNamespace::Ledger, owner_id).await?;

        // Supplied values win; omitted ones keep what is stored.
        // `source` records where the owner first showed up, so the stored value wins.
        // Registering a token is a login and marks the owner authenticated.
        let owner = sqlx::query_as::<_, Owner>(
            r#"
            INSERT INTO owners (
                owner_id, owner_login, avatar_url, blog, bio, email, twitter_username,
                source, is_authenticated, is_sponsor, clv, spent
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8,
                COALESCE($9, $13), COALESCE($10, FALSE), COALESCE($11, 0), COALESCE($12, 0)
            )
            ON CONFLICT (owner_id) DO UPDATE SET
                owner_login = EXCLUDED.owner_login,
                avatar_url = COALESCE($3, owners.avatar_url),
                blog = COALESCE($4, owners.blog),
                bio = COALESCE($5, owners.bio),
                email = COALESCE($6, owners.email),
                twitter_username = COALESCE($7, owners.twitter_username),
                source = COALESCE(owners.source, $8),
                is_authenticated = COALESCE($9, $13 OR owners.is_authenticated),
                is_sponsor = COALESCE($10, owners.is_sponsor),
                clv = COALESCE($11, owners.clv),
                spent = COALESCE($12, owners.spent),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&profile.owner_login)
        .bind(&profile.avatar_url)
        .bind(&profile.blog)
        .bind(&profile.bio)
        .bind(&profile.email)
        .bind(&profile.twitter_username)
        .bind(&source)
        .bind(profile.is_authenticated)
        .bind(profile.is_sponsor)
        .bind(profile.clv)
        .bind(profile.spent)
        .bind(access_token.is_some())
        .fetch_one(&mut *tx)
        .await?;

        if let Some(token) = access_token {
            sqlx::query(
                r#"
                INSERT INTO access_tokens (owner_id, access_token, scope, source)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (owner_id, access_token) DO UPDATE SET
                    scope = EXCLUDED.scope,
                    source = EXCLUDED.source,
                    created_at = NOW()
                "#,
            )
            .bind(owner_id)
            .bind(token)
            .bind(&input.scope)
            .bind(&input.source)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        log::debug!("Initialized owner {} ({})", owner.owner_id, owner.owner_login);

        Ok(owner)
    }

    /// Resolves the owner for an access token registered in this store.
    ///
    /// An unknown token fails with `InvalidToken`: the caller has to
    /// re-authenticate with the identity provider and `initialize` again.
    pub async fn verify(pool: &PgPool, owner_id: &str, token: &str) -> AppResult<Owner> {
        if token.is_empty() {
            return Err(AppError::InvalidToken("Empty access token".to_string()));
        }

        let mut tx = db::begin_keyed(pool, LockNamespace::Ledger, owner_id).await?;

        let result = sqlx::query(
            r#"
            UPDATE access_tokens SET last_used_at = NOW()
            WHERE owner_id = $1 AND access_token = $2
            "#,
        )
        .bind(owner_id)
        .bind(token)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidToken(format!(
                "Token is not registered for owner {}",
                owner_id
            )));
        }

        let owner = touch_owner(&mut tx, owner_id).await?;

        tx.commit().await?;

        Ok(owner)
    }

    /// Applies a charge at most once per idempotency key
    pub async fn charge(pool: &PgPool, owner_id: &str, input: NewCharge) -> AppResult<ChargeOutcome> {
        Self::charge_at(pool, owner_id, input, Utc::now()).await
    }

    /// Same as [`LedgerService::charge`] with an explicit charge timestamp
    pub async fn charge_at(
        pool: &PgPool,
        owner_id: &str,
        input: NewCharge,
        at: DateTime<Utc>,
    ) -> AppResult<ChargeOutcome> {
        if input.amount <= 0 {
            return Err(AppError::InvalidArgument(format!(
                "Charge amount must be a positive number of cents, got {}",
                input.amount
            )));
        }
        if input.idempotency_key.is_empty() {
            return Err(AppError::InvalidArgument(
                "Idempotency key required".to_string(),
            ));
        }

        let mut tx = db::begin_keyed(pool, LockNamespace::Ledger, owner_id).await?;

        let existing: Option<Charge> =
            sqlx::query_as("SELECT * FROM charges WHERE owner_id = $1 AND id = $2")
                .bind(owner_id)
                .bind(&input.idempotency_key)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(charge) = existing {
            let owner = fetch_owner(&mut tx, owner_id).await?;
            tx.commit().await?;

            log::info!(
                "Charge {} for owner {} already processed, not applied again",
                charge.id,
                owner_id
            );

            return Ok(ChargeOutcome {
                owner,
                charge,
                applied: false,
            });
        }

        let owner: Owner = sqlx::query_as(
            r#"
            UPDATE owners
            SET spent = spent + $2,
                updated_at = NOW()
            WHERE owner_id = $1
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(input.amount)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Owner {} not found", owner_id)))?;

        let charge: Charge = sqlx::query_as(
            r#"
            INSERT INTO charges (owner_id, id, amount, source, charged_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(&input.idempotency_key)
        .bind(input.amount)
        .bind(&input.source)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        log::info!(
            "Charged owner {} {} cents (spent {}, balance {})",
            owner_id,
            charge.amount,
            owner.spent,
            owner.balance
        );

        Ok(ChargeOutcome {
            owner,
            charge,
            applied: true,
        })
    }

    /// Overwrites the owner's lifetime value. `spent` is left untouched.
    ///
    /// Admin-only; the identity check is the caller's job.
    pub async fn set_credit(pool: &PgPool, owner_id: &str, new_clv: f64) -> AppResult<Owner> {
        if !new_clv.is_finite() {
            return Err(AppError::InvalidArgument(format!(
                "clv must be a finite number, got {}",
                new_clv
            )));
        }
        let clv = new_clv.round() as i64;

        let mut tx = db::begin_keyed(pool, LockNamespace::Ledger, owner_id).await?;

        let owner: Owner = sqlx::query_as(
            r#"
            UPDATE owners
            SET clv = $2,
                updated_at = NOW()
            WHERE owner_id = $1
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(clv)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Owner {} not found", owner_id)))?;

        tx.commit().await?;

        log::info!("Set clv of owner {} to {} cents", owner_id, clv);

        Ok(owner)
    }

    /// Charges grouped by day and source hostname, oldest day first
    pub async fn usage(pool: &PgPool, owner_id: &str) -> AppResult<Vec<UsageEntry>> {
        let charges = Self::list_charges(pool, owner_id).await?;
        Ok(aggregate_usage(&charges))
    }

    /// Gets the owner of a store, if it was ever initialized
    pub async fn get_owner(pool: &PgPool, owner_id: &str) -> AppResult<Option<Owner>> {
        let owner = sqlx::query_as::<_, Owner>("SELECT * FROM owners WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_optional(pool)
            .await?;

        Ok(owner)
    }

    /// Lists the tokens registered for the owner, newest first
    pub async fn list_tokens(pool: &PgPool, owner_id: &str) -> AppResult<Vec<AccessToken>> {
        let tokens = sqlx::query_as::<_, AccessToken>(
            r#"
            SELECT * FROM access_tokens
            WHERE owner_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(tokens)
    }

    /// Lists the owner's charges in the order they were recorded
    pub async fn list_charges(pool: &PgPool, owner_id: &str) -> AppResult<Vec<Charge>> {
        let charges = sqlx::query_as::<_, Charge>(
            r#"
            SELECT * FROM charges
            WHERE owner_id = $1
            ORDER BY charged_at ASC, id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

        Ok(charges)
    }
}

async fn fetch_owner(tx: &mut Transaction<'_, Postgres>, owner_id: &str) -> AppResult<Owner> {
    sqlx::query_as::<_, Owner>("SELECT * FROM owners WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Owner {} not found", owner_id)))
}

async fn touch_owner(tx: &mut Transaction<'_, Postgres>, owner_id: &str) -> AppResult<Owner> {
    sqlx::query_as::<_, Owner>(
        "UPDATE owners SET updated_at = NOW() WHERE owner_id = $1 RETURNING *",
    )
    .bind(owner_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Owner {} not found", owner_id)))
}
