//! Request extractors and session cookie helpers.
//!
//! [`AuthContext`] is produced here from the session cookie, so any
//! handler that names it in its signature is authenticated. Session
//! failures answer 401 and clear the cookie.

use crate::app_state::AppState;
use crate::domain::{AuthError, ClientInfo};
use crate::session::AuthContext;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::convert::Infallible;
use std::net::SocketAddr;

/// Builds the session cookie carrying `token`.
pub(crate) fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    // ---
    Cookie::build((state.cookie_name().to_string(), token))
        .http_only(true)
        .secure(state.cookie_secure())
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Removes the session cookie from the client.
pub(crate) fn clear_session_cookie(jar: CookieJar, state: &AppState) -> CookieJar {
    // ---
    jar.remove(Cookie::build((state.cookie_name().to_string(), "")).path("/"))
}

/// The session token presented with the request, if any.
pub(crate) fn session_token(jar: &CookieJar, state: &AppState) -> Option<String> {
    // ---
    jar.get(state.cookie_name())
        .map(|c| c.value().to_string())
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthContext {
    // ---
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // ---
        let jar = CookieJar::from_headers(&parts.headers);

        let Some(token) = session_token(&jar, state) else {
            return Err(AuthError::NoSession.into_response());
        };

        match state.sessions().resolve(&token).await {
            Ok(ctx) => Ok(ctx),
            Err(e @ (AuthError::NoSession | AuthError::Expired | AuthError::AccountMissing)) => {
                Err((clear_session_cookie(jar, state), e).into_response())
            }
            Err(e) => Err(e.into_response()),
        }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    // ---
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // ---
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(client_info(&parts.headers, peer))
    }
}

/// Client address is the first `X-Forwarded-For` hop, else the socket
/// peer, else "unknown".
fn client_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientInfo {
    // ---
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string);

    let ip = forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    ClientInfo::new(ip, user_agent)
}
