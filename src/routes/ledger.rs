use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::AdminAuth;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{InitializeOwner, NewCharge};
use crate::services::LedgerService;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChargeQuery {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetCreditQuery {
    #[serde(default)]
    pub clv: Option<String>,
}

/// POST /ledger/{owner_id}/initialize - Create or update the owner
pub async fn initialize(
    pool: web::Data<DbPool>,
    _admin: AdminAuth,
    path: web::Path<String>,
    body: web::Json<InitializeOwner>,
) -> AppResult<HttpResponse> {
    let owner_id = path.into_inner();
    let owner = LedgerService::initialize(pool.get_ref(), &owner_id, body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(owner))
}

/// GET /ledger/{owner_id}/verify?token= - Resolve the owner for a token
pub async fn verify(
    pool: web::Data<DbPool>,
    _admin: AdminAuth,
    path: web::Path<String>,
    query: web::Query<VerifyQuery>,
) -> AppResult<HttpResponse> {
    let owner_id = path.into_inner();
    let token = query.token.as_deref().unwrap_or_default();
    let owner = LedgerService::verify(pool.get_ref(), &owner_id, token).await?;

    Ok(HttpResponse::Ok().json(owner))
}

/// POST /ledger/{owner_id}/charge?amount=&idempotency_key=&source=
pub async fn charge(
    pool: web::Data<DbPool>,
    _admin: AdminAuth,
    path: web::Path<String>,
    query: web::Query<ChargeQuery>,
) -> AppResult<HttpResponse> {
    let owner_id = path.into_inner();
    let query = query.into_inner();

    let amount: i64 = query
        .amount
        .as_deref()
        .ok_or_else(|| AppError::InvalidArgument("amount is required".to_string()))?
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidArgument("amount must be an integer".to_string()))?;

    let idempotency_key = query
        .idempotency_key
        .ok_or_else(|| AppError::InvalidArgument("Idempotency key required".to_string()))?;

    let outcome = LedgerService::charge(
        pool.get_ref(),
        &owner_id,
        NewCharge {
            amount,
            idempotency_key,
            source: query.source,
        },
    )
    .await?;

    Ok(HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-store"))
        .json(outcome))
}

/// POST /ledger/{owner_id}/set-credit?clv= - Overwrite lifetime value
pub async fn set_credit(
    pool: web::Data<DbPool>,
    _admin: AdminAuth,
    path: web::Path<String>,
    query: web::Query<SetCreditQuery>,
) -> AppResult<HttpResponse> {
    let owner_id = path.into_inner();

    let clv: f64 = query
        .clv
        .as_deref()
        .ok_or_else(|| AppError::InvalidArgument("clv is required".to_string()))?
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidArgument("clv must be a number".to_string()))?;

    let owner = LedgerService::set_credit(pool.get_ref(), &owner_id, clv).await?;

    Ok(HttpResponse::Ok().json(owner))
}

/// GET /ledger/{owner_id}/usage - Charges by day and hostname
pub async fn usage(
    pool: web::Data<DbPool>,
    _admin: AdminAuth,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let owner_id = path.into_inner();
    let usage = LedgerService::usage(pool.get_ref(), &owner_id).await?;

    Ok(HttpResponse::Ok().json(usage))
}

/// Configure ledger routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/ledger/{owner_id}")
            .route("/initialize", web::post().to(initialize))
            .route("/verify", web::get().to(verify))
            .route("/charge", web::post().to(charge))
            .route("/set-credit", web::post().to(set_credit))
            .route("/usage", web::get().to(usage)),
    );
}
