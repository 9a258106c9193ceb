use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

pub const OWNER_ID_COOKIE: &str = "owner_id";
pub const AUTHORIZATION_COOKIE: &str = "authorization";
pub const SCOPE_COOKIE: &str = "github_oauth_scope";
pub const API_KEY_PARAM: &str = "apiKey";

/// Loopback key used when no forwarded client address is present
pub const FALLBACK_CLIENT_KEY: &str = "127.0.0.1";

/// Owner identity material carried by a request.
///
/// Sources, in order of precedence:
/// - `owner_id`: the `owner_id` cookie
/// - access token: the `authorization` cookie, then the `Authorization`
///   header (a leading `Bearer ` is stripped), then the `apiKey` query param
/// - scope: the `github_oauth_scope` cookie
///
/// Cookie values arrive percent-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SponsorCredentials {
    pub owner_id: Option<String>,
    pub access_token: Option<String>,
    pub scope: Option<String>,
}

impl SponsorCredentials {
    pub fn from_request(req: &HttpRequest) -> Self {
        let cookie = |name: &str| {
            req.cookie(name)
                .map(|c| c.value().trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let authorization = cookie(AUTHORIZATION_COOKIE).or_else(|| {
            req.headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        });

        let access_token = match authorization {
            Some(value) => Some(strip_bearer(&value).to_string()),
            None => query_param(req.query_string(), API_KEY_PARAM),
        }
        .filter(|t| !t.is_empty());

        Self {
            owner_id: cookie(OWNER_ID_COOKIE),
            access_token,
            scope: cookie(SCOPE_COOKIE),
        }
    }

    /// Owner id and token, when both are present
    pub fn identity(&self) -> Option<(&str, &str)> {
        Some((self.owner_id.as_deref()?, self.access_token.as_deref()?))
    }
}

impl FromRequest for SponsorCredentials {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(SponsorCredentials::from_request(req)))
    }
}

/// Partition key of the client for rate limiting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl ClientKey {
    /// `CF-Connecting-IP`, else the first `X-Forwarded-For` hop, else loopback
    pub fn from_request(req: &HttpRequest) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        };

        let key = header("CF-Connecting-IP")
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .or_else(|| {
                header("X-Forwarded-For").and_then(|chain| {
                    chain
                        .split(',')
                        .next()
                        .map(|ip| ip.trim().to_string())
                        .filter(|ip| !ip.is_empty())
                })
            })
            .unwrap_or_else(|| FALLBACK_CLIENT_KEY.to_string());

        ClientKey(key)
    }
}

impl FromRequest for ClientKey {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(ClientKey::from_request(req)))
    }
}

fn strip_bearer(value: &str) -> &str {
    value.strip_prefix("Bearer ").unwrap_or(value).trim()
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
