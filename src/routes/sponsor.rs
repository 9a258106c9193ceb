use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::auth::{ClientKey, SponsorCredentials};
use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::routes::ratelimit::with_rate_limit_headers;
use crate::services::{ChargePolicy, LedgerService, RateLimitService, SponsorService};

#[derive(Debug, Serialize)]
pub struct RateLimitedResponse {
    error: &'static str,
    wait_time_ms: i64,
}

/// GET /sponsor - Rate-limited sponsor lookup, charging per request when configured
pub async fn get_sponsor(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    client: ClientKey,
    credentials: SponsorCredentials,
) -> AppResult<HttpResponse> {
    let check =
        RateLimitService::check_request(pool.get_ref(), &client.0, None, &config.rate_limit)
            .await?;

    if check.is_limited() {
        log::debug!(
            "Client {} rate limited for {}ms",
            client.0,
            check.wait_time_ms
        );
        let mut response = HttpResponse::TooManyRequests();
        response.insert_header((header::RETRY_AFTER, check.retry_after_secs().to_string()));
        with_rate_limit_headers(&mut response, &check.headers);
        return Ok(response.json(RateLimitedResponse {
            error: "rate_limited",
            wait_time_ms: check.wait_time_ms,
        }));
    }

    let source = request_url(&req);
    let status = SponsorService::get_sponsor(
        pool.get_ref(),
        &credentials,
        ChargePolicy::from_config(&config.billing),
        Some(&source),
    )
    .await?;

    let mut response = HttpResponse::Ok();
    response.insert_header((header::CACHE_CONTROL, "no-store"));
    with_rate_limit_headers(&mut response, &check.headers);

    Ok(response.json(status))
}

/// GET /usage - Usage of the credentialed owner
pub async fn get_usage(
    pool: web::Data<DbPool>,
    credentials: SponsorCredentials,
) -> AppResult<HttpResponse> {
    let (owner_id, token) = credentials
        .identity()
        .ok_or_else(|| AppError::InvalidToken("Missing owner credentials".to_string()))?;

    LedgerService::verify(pool.get_ref(), owner_id, token).await?;
    let usage = LedgerService::usage(pool.get_ref(), owner_id).await?;

    Ok(HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(usage))
}

/// Absolute URL of the request, recorded as the charge source
fn request_url(req: &HttpRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}{}", info.scheme(), info.host(), req.uri())
}

/// Configure public sponsor routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/sponsor", web::get().to(get_sponsor))
        .route("/usage", web::get().to(get_usage));
}
