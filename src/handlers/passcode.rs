use axum::{Json, extract::State};
use serde::Deserialize;
use tower_cookies::Cookies;
use tower_cookies::cookie::time::Duration;

use crate::{
    error::{AppError, Result},
    handlers::auth::{OkResponse, PeerAddr, clear_cookie, create_secure_cookie},
    middleware_layer::passcode::{PASSCODE_COOKIE, passcode_cookie_value, passcode_matches},
    state::AppState,
    validation::{auth::validate_passcode_present, json::JsonBody},
};

#[derive(Deserialize, Default)]
pub struct PasscodeRequest {
    #[serde(default)]
    pub passcode: String,
}

/// Checks the passcode and, on a match, sets the `pass_verified` cookie for a day.
pub async fn passcode(
    State(state): State<AppState>,
    peer: PeerAddr,
    cookies: Cookies,
    payload: std::result::Result<JsonBody<PasscodeRequest>, AppError>,
) -> Result<Json<OkResponse>> {
    let payload = payload.map(|JsonBody(p)| p).unwrap_or_default();
    validate_passcode_present(&payload.passcode)?;

    if !passcode_matches(&state.config.passcode, &payload.passcode) {
        tracing::warn!("❌ Wrong passcode from {}", peer);
        return Err(AppError::Authentication("Invalid passcode".to_string()));
    }

    cookies.add(create_secure_cookie(
        PASSCODE_COOKIE,
        passcode_cookie_value(&state.config.passcode),
        Duration::days(1),
        state.config.session.cookie_secure,
    ));

    tracing::info!("✅ Passcode accepted from {}", peer);
    Ok(OkResponse::ok())
}

pub async fn passcode_logout(cookies: Cookies) -> Json<OkResponse> {
    clear_cookie(&cookies, PASSCODE_COOKIE);
    OkResponse::ok()
}
