use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};

use crate::config::RateLimitConfig;
use crate::db::{self, LockNamespace};
use crate::error::{AppError, AppResult};
use crate::models::{RateLimitCheck, RateLimitOptions, RateLimitState};

pub struct RateLimitService;

const SELECT_STATE: &str = r#"
    SELECT request_limit, reset_interval_ms, remaining_requests, reset_time, alarm_at
    FROM rate_limits
    WHERE key = $1
"#;

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl RateLimitService {
    /// Admission check for one request on `key`
    pub async fn check_request(
        pool: &PgPool,
        key: &str,
        options: Option<&RateLimitOptions>,
        defaults: &RateLimitConfig,
    ) -> AppResult<RateLimitCheck> {
        Self::check_request_at(pool, key, options, defaults, now_ms()).await
    }

    /// Admission check evaluated at `now` (ms since epoch).
    ///
    /// Options, when given, reconfigure the key and start a fresh window.
    /// Otherwise the persisted state is restored, or a default bucket is
    /// created for a key seen for the first time. The state is persisted and
    /// the wake-up pointed at `reset_time` whether or not the request is
    /// admitted.
    pub async fn check_request_at(
        pool: &PgPool,
        key: &str,
        options: Option<&RateLimitOptions>,
        defaults: &RateLimitConfig,
        now: i64,
    ) -> AppResult<RateLimitCheck> {
        let mut tx = db::begin_keyed(pool, LockNamespace::RateLimit, key).await?;

        let stored = load_state(&mut tx, key).await?;
        let mut state = match (options, stored) {
            (Some(options), stored) => {
                let mut state = stored.unwrap_or_else(|| default_state(defaults, now));
                state.reconfigure(options, defaults, now);
                state
            }
            (None, Some(state)) => state,
            (None, None) => default_state(defaults, now),
        };

        state.refresh(now);
        let wait_time_ms = state.admit(now);
        state.schedule_alarm();

        save_state(&mut tx, key, &state).await?;
        tx.commit().await?;

        if wait_time_ms > 0 {
            log::debug!("Rate limited {}: retry in {}ms", key, wait_time_ms);
        }

        Ok(RateLimitCheck {
            wait_time_ms,
            headers: state.headers(),
        })
    }

    /// Scheduled wake-up: resets the bucket to full, persists it and
    /// schedules the next wake-up. Runs regardless of traffic.
    pub async fn on_wakeup(pool: &PgPool, key: &str, now: i64) -> AppResult<RateLimitState> {
        let mut tx = db::begin_keyed(pool, LockNamespace::RateLimit, key).await?;

        let mut state = load_state(&mut tx, key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rate limiter {} not found", key)))?;

        state.wake(now);
        state.schedule_alarm();

        save_state(&mut tx, key, &state).await?;
        tx.commit().await?;

        Ok(state)
    }

    /// Runs the wake-up for `key` only if its alarm is still due.
    ///
    /// The alarm worker reads due keys before taking their locks; a request
    /// may have moved the alarm in between, in which case nothing happens.
    pub async fn fire_alarm_if_due(
        pool: &PgPool,
        key: &str,
        now: i64,
    ) -> AppResult<Option<RateLimitState>> {
        let mut tx = db::begin_keyed(pool, LockNamespace::RateLimit, key).await?;

        let Some(mut state) = load_state(&mut tx, key).await? else {
            return Ok(None);
        };
        match state.alarm_at {
            Some(at) if at <= now => {}
            _ => return Ok(None),
        }

        state.wake(now);
        state.schedule_alarm();

        save_state(&mut tx, key, &state).await?;
        tx.commit().await?;

        Ok(Some(state))
    }

    /// Keys whose wake-up is due at `now`, oldest first
    pub async fn due_alarms(pool: &PgPool, now: i64, limit: i64) -> AppResult<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT key FROM rate_limits
            WHERE alarm_at IS NOT NULL AND alarm_at <= $1
            ORDER BY alarm_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(keys)
    }

    /// Current persisted state of a key
    pub async fn get_state(pool: &PgPool, key: &str) -> AppResult<Option<RateLimitState>> {
        let state = sqlx::query_as::<_, RateLimitState>(SELECT_STATE)
            .bind(key)
            .fetch_optional(pool)
            .await?;

        Ok(state)
    }
}

fn default_state(defaults: &RateLimitConfig, now: i64) -> RateLimitState {
    RateLimitState::fresh(defaults.request_limit, defaults.reset_interval_ms, now)
}

async fn load_state(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
) -> AppResult<Option<RateLimitState>> {
    let state = sqlx::query_as::<_, RateLimitState>(SELECT_STATE)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(state)
}

async fn save_state(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    state: &RateLimitState,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO rate_limits (
            key, request_limit, reset_interval_ms, remaining_requests, reset_time, alarm_at
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (key) DO UPDATE SET
            request_limit = EXCLUDED.request_limit,
            reset_interval_ms = EXCLUDED.reset_interval_ms,
            remaining_requests = EXCLUDED.remaining_requests,
            reset_time = EXCLUDED.reset_time,
            alarm_at = EXCLUDED.alarm_at,
            updated_at = NOW()
        "#,
    )
    .bind(key)
    .bind(state.request_limit)
    .bind(state.reset_interval_ms)
    .bind(state.remaining_requests)
    .bind(state.reset_time)
    .bind(state.alarm_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
