//! Sponsorgate Server Library
//!
//! Per-owner credit ledger and per-client rate limiter behind an HTTP API.

pub mod alarm;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use actix_web::web;

/// Registers every route of the service
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.configure(routes::health::configure)
        .configure(routes::sponsor::configure)
        .configure(routes::ledger::configure)
        .configure(routes::ratelimit::configure);
}
