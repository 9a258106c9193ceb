//! Unit tests for configuration parsing
//!
//! Tests environment variable parsing and default values.
//!
//! Note: These tests modify global environment variables and must run serially.

use sponsorgate::config::{
    BillingConfig, RateLimitConfig, SecurityConfig, DEFAULT_REQUEST_LIMIT,
    DEFAULT_RESET_INTERVAL_MS,
};
use serial_test::serial;
use std::time::Duration;

fn clear_rate_limit_env() {
    std::env::remove_var("RATE_LIMIT_REQUESTS");
    std::env::remove_var("RATE_LIMIT_RESET_INTERVAL_MS");
    std::env::remove_var("RATE_LIMIT_ALARM_POLL_MS");
}

// =============================================================================
// Rate Limit Config Tests
// =============================================================================

#[test]
#[serial]
fn test_rate_limit_config_defaults() {
    clear_rate_limit_env();

    let config = RateLimitConfig::from_env();

    assert_eq!(config.request_limit, 25);
    assert_eq!(config.reset_interval_ms, 3_600_000);
    assert_eq!(config.alarm_poll_interval, Duration::from_millis(1000));
}

#[test]
#[serial]
fn test_rate_limit_config_custom_values() {
    std::env::set_var("RATE_LIMIT_REQUESTS", "100");
    std::env::set_var("RATE_LIMIT_RESET_INTERVAL_MS", "60000");
    std::env::set_var("RATE_LIMIT_ALARM_POLL_MS", "250");

    let config = RateLimitConfig::from_env();

    assert_eq!(config.request_limit, 100);
    assert_eq!(config.reset_interval_ms, 60_000);
    assert_eq!(config.alarm_poll_interval, Duration::from_millis(250));

    clear_rate_limit_env();
}

#[test]
#[serial]
fn test_rate_limit_config_invalid_values_use_defaults() {
    std::env::set_var("RATE_LIMIT_REQUESTS", "not-a-number");
    std::env::set_var("RATE_LIMIT_RESET_INTERVAL_MS", "abc");

    let config = RateLimitConfig::from_env();

    assert_eq!(config.request_limit, DEFAULT_REQUEST_LIMIT);
    assert_eq!(config.reset_interval_ms, DEFAULT_RESET_INTERVAL_MS);

    clear_rate_limit_env();
}

#[test]
#[serial]
fn test_rate_limit_config_non_positive_values_use_defaults() {
    std::env::set_var("RATE_LIMIT_REQUESTS", "0");
    std::env::set_var("RATE_LIMIT_RESET_INTERVAL_MS", "-5");
    std::env::set_var("RATE_LIMIT_ALARM_POLL_MS", "0");

    let config = RateLimitConfig::from_env();

    assert_eq!(config.request_limit, DEFAULT_REQUEST_LIMIT);
    assert_eq!(config.reset_interval_ms, DEFAULT_RESET_INTERVAL_MS);
    // tokio::time::interval rejects a zero period
    assert_eq!(config.alarm_poll_interval, Duration::from_millis(1000));

    clear_rate_limit_env();
}

// =============================================================================
// Billing Config Tests
// =============================================================================

#[test]
#[serial]
fn test_billing_config_defaults() {
    std::env::remove_var("CHARGE_PER_REQUEST_CENTS");
    std::env::remove_var("ALLOW_NEGATIVE_BALANCE");

    let config = BillingConfig::from_env();

    assert_eq!(config.charge_per_request_cents, 0);
    assert!(!config.allow_negative_balance);
}

#[test]
#[serial]
fn test_billing_config_custom_values() {
    std::env::set_var("CHARGE_PER_REQUEST_CENTS", "3");
    std::env::set_var("ALLOW_NEGATIVE_BALANCE", "true");

    let config = BillingConfig::from_env();

    assert_eq!(config.charge_per_request_cents, 3);
    assert!(config.allow_negative_balance);

    std::env::remove_var("CHARGE_PER_REQUEST_CENTS");
    std::env::remove_var("ALLOW_NEGATIVE_BALANCE");
}

#[test]
#[serial]
fn test_billing_config_negative_charge_uses_default() {
    std::env::set_var("CHARGE_PER_REQUEST_CENTS", "-1");

    let config = BillingConfig::from_env();

    assert_eq!(config.charge_per_request_cents, 0);

    std::env::remove_var("CHARGE_PER_REQUEST_CENTS");
}

// =============================================================================
// Security Config Tests
// =============================================================================

#[test]
#[serial]
fn test_security_config_admin_key() {
    std::env::set_var("ADMIN_API_KEY", "s3cret");
    assert_eq!(
        SecurityConfig::from_env().admin_api_key.as_deref(),
        Some("s3cret")
    );

    std::env::set_var("ADMIN_API_KEY", "");
    assert_eq!(SecurityConfig::from_env().admin_api_key, None);

    std::env::remove_var("ADMIN_API_KEY");
    assert_eq!(SecurityConfig::from_env().admin_api_key, None);
}
