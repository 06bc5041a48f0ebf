use std::{convert::Infallible, net::SocketAddr};

use axum::{
    Json,
    extract::{ConnectInfo, FromRequestParts, State},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies};
use tower_cookies::cookie::time::Duration;

use crate::{
    crypto::token::generate_session_token,
    error::{AppError, Result},
    middleware_layer::auth::{SESSION_COOKIE, credentials_match, extract_session_token},
    state::AppState,
    validation::{auth::validate_credentials_present, json::JsonBody},
};

/// The request payload for admin login.
#[derive(Deserialize, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
}

/// `{"ok": true}`.
#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

/// The response payload for `whoami`.
#[derive(Serialize)]
pub struct WhoamiResponse {
    pub user: String,
}

/// The peer address, when the server was started with connect info.
pub struct PeerAddr(pub Option<SocketAddr>);

impl<S: Send + Sync> FromRequestParts<S> for PeerAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(PeerAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        ))
    }
}

impl std::fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "{}", addr),
            None => f.write_str("unknown"),
        }
    }
}

/// Creates an HttpOnly, SameSite=Lax cookie scoped to `/`.
pub fn create_secure_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    secure: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);

    cookie.set_http_only(true);
    if secure {
        cookie.set_secure(true);
    }
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(max_age);
    cookie.set_path("/");

    cookie
}

/// Removes `name` from the client.
pub fn clear_cookie(cookies: &Cookies, name: &'static str) {
    let mut cookie = Cookie::new(name, "");
    cookie.set_path("/");
    cookies.remove(cookie);
}

/// Handles admin login.
pub async fn login(
    State(state): State<AppState>,
    peer: PeerAddr,
    cookies: Cookies,
    payload: std::result::Result<JsonBody<LoginRequest>, AppError>,
) -> Result<Json<OkResponse>> {
    // An unreadable body counts as missing credentials.
    let payload = payload.map(|JsonBody(p)| p).unwrap_or_default();
    tracing::info!("🔐 Login attempt - user: {}, peer: {}", payload.user, peer);
    validate_credentials_present(&payload.user, &payload.pass)?;

    if !credentials_match(&state.config.admin, &payload.user, &payload.pass) {
        tracing::warn!("❌ Invalid credentials for user: {}, peer: {}", payload.user, peer);
        return Err(AppError::Authentication("Invalid credentials".to_string()));
    }

    let token = generate_session_token();
    state.sessions.put(&token).await;

    let max_age = Duration::seconds((state.config.session.ttl.as_secs() as i64).max(1));
    cookies.add(create_secure_cookie(
        SESSION_COOKIE,
        token,
        max_age,
        state.config.session.cookie_secure,
    ));

    tracing::info!("✅ Admin logged in: {}", payload.user);
    Ok(OkResponse::ok())
}

/// Handles admin logout. Succeeds whether or not a session existed.
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Json<OkResponse> {
    if let Some(token) = extract_session_token(&cookies) {
        state.sessions.delete(&token).await;
        tracing::info!("👋 Admin session deleted");
    }

    clear_cookie(&cookies, SESSION_COOKIE);
    OkResponse::ok()
}

/// Reports the admin identity for a live session cookie.
pub async fn whoami(State(state): State<AppState>, cookies: Cookies) -> Result<Json<WhoamiResponse>> {
    match extract_session_token(&cookies) {
        Some(token) if state.sessions.exists(&token).await => Ok(Json(WhoamiResponse {
            user: state.config.admin.user.clone(),
        })),
        _ => Err(AppError::Authentication("Not authenticated".to_string())),
    }
}
