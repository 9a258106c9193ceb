//! Durable wake-ups for rate limiter keys.
//!
//! A wake-up is the `alarm_at` column of a `rate_limits` row, so it survives
//! restarts; the worker here is only the clock that fires them.

pub mod worker;

pub use worker::{fire_due_alarms, run};
