use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::auth::token::constant_time_eq;
use crate::config::Config;
use crate::error::AppError;

/// Extractor guarding the internal keyed routes.
///
/// Requires `Authorization: Bearer <ADMIN_API_KEY>`. When no admin key is
/// configured every call is rejected.
///
/// Usage in handlers:
/// ```ignore
/// async fn set_credit(_admin: AdminAuth) -> HttpResponse { ... }
/// ```
pub struct AdminAuth;

impl FromRequest for AdminAuth {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authorize_admin(req))
    }
}

fn authorize_admin(req: &HttpRequest) -> Result<AdminAuth, AppError> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| AppError::Internal("Configuration not available".to_string()))?;

    let expected = config
        .security
        .admin_api_key
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Admin API is disabled".to_string()))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let key = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized(
            "Invalid Authorization header format, expected 'Bearer <key>'".to_string(),
        )
    })?;

    if !constant_time_eq(key.trim(), expected) {
        return Err(AppError::Unauthorized("Invalid admin key".to_string()));
    }

    Ok(AdminAuth)
}
