//! HTTP handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use super::state::GatewayState;
use super::upstream::SearchQuery;
use crate::error::{GateError, Result};
use crate::oracle::{is_valid_address, ChainBalance};
use crate::ratelimit::{RateLimitStatus, RateLimiter};
use crate::token::{IdentityClass, IdentityEvidence, TokenCodec};

/// Quota of the caller's tier.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Requests left in the current window.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// End of the current window, epoch milliseconds.
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct WalletLoginRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub identity: IdentityClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balances: Option<Vec<ChainBalance>>,
}

#[derive(Debug, Serialize)]
pub struct QuotaResponse {
    pub identity: IdentityClass,
    pub limit: u32,
    pub remaining: u32,
    pub window_secs: u64,
}

/// Who is calling, as read from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub class: IdentityClass,
    /// Wallet address for holders, the raw token for everyone else
    pub key: String,
}

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Credential login.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<GatewayState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let result = login_inner(&state, body).await;
    finish(&state, result)
}

async fn login_inner(
    state: &GatewayState,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = body.map_err(bad_body)?;

    if !state.credentials.verify(&request.username, &request.password) {
        warn!(username = %request.username, "Rejected credential login");
        return Err(GateError::Unauthorized("invalid username or password".to_string()));
    }

    let token = state.codec.issue(&IdentityEvidence::Credential {
        username: request.username.clone(),
    });
    info!(username = %request.username, "Credential login succeeded");

    Ok(Json(TokenResponse {
        token,
        identity: IdentityClass::Regular,
        balances: None,
    })
    .into_response())
}

/// NFT ownership login.
#[instrument(skip_all)]
pub async fn wallet_login(
    State(state): State<GatewayState>,
    body: std::result::Result<Json<WalletLoginRequest>, JsonRejection>,
) -> Response {
    let result = wallet_login_inner(&state, body).await;
    finish(&state, result)
}

async fn wallet_login_inner(
    state: &GatewayState,
    body: std::result::Result<Json<WalletLoginRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = body.map_err(bad_body)?;
    let address = request.address.trim();

    if !is_valid_address(address) {
        return Err(GateError::BadRequest(
            "address must be 0x followed by 40 hex digits".to_string(),
        ));
    }

    let ownership = state.oracle.has_ownership(address).await;
    if !ownership.owned {
        return Err(GateError::NotHolder(address.to_string()));
    }

    let token = state.codec.issue(&IdentityEvidence::Wallet {
        address: address.to_string(),
    });
    info!(address = %address, "Wallet login succeeded");

    Ok(Json(TokenResponse {
        token,
        identity: IdentityClass::NftHolder,
        balances: Some(ownership.balances),
    })
    .into_response())
}

/// Gated search, forwarded upstream when the caller's quota admits it.
#[instrument(skip_all)]
pub async fn search(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: std::result::Result<Json<SearchQuery>, JsonRejection>,
) -> Response {
    let result = search_inner(&state, &headers, body).await;
    finish(&state, result)
}

async fn search_inner(
    state: &GatewayState,
    headers: &HeaderMap,
    body: std::result::Result<Json<SearchQuery>, JsonRejection>,
) -> Result<Response> {
    let caller = identify(&state.codec, headers)?;
    let provider = state.search.clone().ok_or(GateError::UpstreamNotConfigured)?;

    let Json(query) = body.map_err(bad_body)?;
    query.validate()?;

    let limiter = state.tiers.for_class(caller.class);
    let status = limiter.check_limit(&caller.key);

    let response = if status.allowed {
        match provider.search(&query).await {
            Ok(results) => Json(results).into_response(),
            Err(e) => e.to_response(state.expose_error_details),
        }
    } else {
        GateError::QuotaExceeded {
            reset_time_ms: status.reset_time_ms,
        }
        .to_response(state.expose_error_details)
    };

    Ok(with_rate_limit_headers(response, limiter, &status))
}

/// Remaining quota for the caller, without spending any.
#[instrument(skip_all)]
pub async fn quota(State(state): State<GatewayState>, headers: HeaderMap) -> Response {
    let result = identify(&state.codec, &headers).map(|caller| {
        let limiter = state.tiers.for_class(caller.class);
        Json(QuotaResponse {
            identity: caller.class,
            limit: limiter.limit(),
            remaining: limiter.get_remaining_requests(&caller.key),
            window_secs: limiter.window().as_secs(),
        })
        .into_response()
    });
    finish(&state, result)
}

/// Read the bearer token and resolve it to a caller.
///
/// A token that claims the holder class but has no usable wallet segment is
/// rejected rather than treated as a regular token.
pub fn identify(codec: &TokenCodec, headers: &HeaderMap) -> Result<Caller> {
    let token = bearer_token(headers)
        .ok_or_else(|| GateError::Unauthorized("missing bearer token".to_string()))?;

    if !codec.is_current(token) {
        return Err(GateError::Unauthorized("invalid or expired token".to_string()));
    }

    let class = TokenCodec::classify(token);
    let key = match class {
        IdentityClass::NftHolder => TokenCodec::extract_key(token)
            .ok_or(GateError::MalformedToken)?
            .to_string(),
        IdentityClass::Regular => token.to_string(),
    };

    Ok(Caller { class, key })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Decorate a gated response with the caller's quota status.
pub fn with_rate_limit_headers(
    mut response: Response,
    limiter: &RateLimiter,
    status: &RateLimitStatus,
) -> Response {
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limiter.limit()));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(status.reset_time_ms));
    response
}

fn bad_body(rejection: JsonRejection) -> GateError {
    GateError::BadRequest(rejection.body_text())
}

fn finish(state: &GatewayState, result: Result<Response>) -> Response {
    result.unwrap_or_else(|e| e.to_response(state.expose_error_details))
}
