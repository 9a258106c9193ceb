use sqlx::PgPool;
use std::time::Duration;

use crate::error::AppResult;
use crate::services::{now_ms, RateLimitService};

/// Maximum number of keys woken per tick
pub const ALARM_BATCH_SIZE: i64 = 500;

/// Fires every wake-up due at `now`.
///
/// Each key is woken in its own locked transaction. A failure on one key is
/// logged and does not stop the others; the key stays due and is retried on
/// the next tick. Returns the number of keys actually reset.
pub async fn fire_due_alarms(pool: &PgPool, now: i64, batch: i64) -> AppResult<usize> {
    let keys = RateLimitService::due_alarms(pool, now, batch).await?;
    let mut fired = 0;

    for key in &keys {
        match RateLimitService::fire_alarm_if_due(pool, key, now).await {
            Ok(Some(state)) => {
                fired += 1;
                log::debug!(
                    "Woke rate limiter {}: {} requests until {}",
                    key,
                    state.remaining_requests,
                    state.reset_time
                );
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Failed to wake rate limiter {}: {}", key, e);
            }
        }
    }

    Ok(fired)
}

/// Polls for due wake-ups forever
pub async fn run(pool: PgPool, poll_interval: Duration) {
    log::info!(
        "Rate limit alarm worker started (poll every {}ms)",
        poll_interval.as_millis()
    );

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match fire_due_alarms(&pool, now_ms(), ALARM_BATCH_SIZE).await {
            Ok(0) => {}
            Ok(fired) => log::debug!("Fired {} rate limit alarms", fired),
            Err(e) => log::error!("Failed to poll rate limit alarms: {}", e),
        }
    }
}
