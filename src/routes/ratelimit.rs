use actix_web::{web, HttpResponse, HttpResponseBuilder};

use crate::auth::AdminAuth;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{RateLimitHeaders, RateLimitOptions};
use crate::services::RateLimitService;

/// POST /ratelimit/{key}/check - Admission check, optional JSON options body
pub async fn check(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    _admin: AdminAuth,
    path: web::Path<String>,
    body: Option<web::Json<RateLimitOptions>>,
) -> AppResult<HttpResponse> {
    let key = path.into_inner();
    let options = body.map(|b| b.into_inner());

    let check = RateLimitService::check_request(
        pool.get_ref(),
        &key,
        options.as_ref(),
        &config.rate_limit,
    )
    .await?;

    let mut response = HttpResponse::Ok();
    with_rate_limit_headers(&mut response, &check.headers);

    Ok(response.json(check))
}

/// GET /ratelimit/{key} - Current persisted state
pub async fn get_state(
    pool: web::Data<DbPool>,
    _admin: AdminAuth,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let key = path.into_inner();
    let state = RateLimitService::get_state(pool.get_ref(), &key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Rate limiter {} not found", key)))?;

    Ok(HttpResponse::Ok().json(state))
}

/// Attaches the `X-RateLimit-*` triad
pub fn with_rate_limit_headers(response: &mut HttpResponseBuilder, headers: &RateLimitHeaders) {
    for (name, value) in headers.pairs() {
        response.insert_header((name, value));
    }
}

/// Configure rate limiter routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/ratelimit/{key}")
            .route("", web::get().to(get_state))
            .route("/check", web::post().to(check)),
    );
}
