use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use subtle::ConstantTimeEq;
use tower_cookies::Cookies;

use crate::{config::AdminCredentials, error::AppError, state::AppState};

/// The cookie carrying the admin session token.
pub const SESSION_COOKIE: &str = "admin_token";

/// How a request was let through the admin gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// A live `admin_token` session cookie.
    Session,
    /// HTTP Basic credentials matching the admin identity.
    BasicCredentials,
}

/// Why a request was refused by the admin gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unauthorized {
    /// Neither a session cookie nor Basic credentials were sent.
    NoCredentials,
    /// Something was sent but did not check out.
    Rejected,
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        AppError::Authentication("Authentication required".to_string()).into_response()
    }
}

/// Extracts the session token from the request cookies.
pub fn extract_session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Decodes an `Authorization: Basic` header into user and password.
pub fn parse_basic(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;

    Some((user.to_string(), pass.to_string()))
}

/// Compares `user`/`pass` against the admin identity in constant time.
pub fn credentials_match(admin: &AdminCredentials, user: &str, pass: &str) -> bool {
    let user_ok = user.as_bytes().ct_eq(admin.user.as_bytes());
    let pass_ok = pass.as_bytes().ct_eq(admin.pass.as_bytes());
    (user_ok & pass_ok).into()
}

/// Whether the request carries HTTP Basic credentials for the admin.
pub fn basic_matches(admin: &AdminCredentials, headers: &HeaderMap) -> bool {
    parse_basic(headers).is_some_and(|(user, pass)| credentials_match(admin, &user, &pass))
}

/// Decides whether a request may use admin endpoints.
///
/// A live session cookie wins; its expiry slides forward as a side effect of
/// the lookup. Otherwise HTTP Basic credentials are checked.
pub async fn authorize(
    state: &AppState,
    cookies: &Cookies,
    headers: &HeaderMap,
) -> Result<Authorization, Unauthorized> {
    let token = extract_session_token(cookies);

    if let Some(token) = &token {
        if state.sessions.exists(token).await {
            return Ok(Authorization::Session);
        }
        tracing::debug!("🔑 admin_token cookie present but not live");
    }

    match parse_basic(headers) {
        Some((user, pass)) if credentials_match(&state.config.admin, &user, &pass) => {
            Ok(Authorization::BasicCredentials)
        }
        Some((user, _)) => {
            tracing::warn!("❌ Basic auth rejected for user: {}", user);
            Err(Unauthorized::Rejected)
        }
        None if token.is_some() => Err(Unauthorized::Rejected),
        None => Err(Unauthorized::NoCredentials),
    }
}

/// A middleware that requires an admin session or admin Basic credentials.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The inner response, or 401 `{"error": "Authentication required"}`.
pub async fn require_admin(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking admin authentication...");

    match authorize(&state, &cookies, request.headers()).await {
        Ok(authorization) => {
            tracing::debug!("✅ Admin authorized via {:?}", authorization);
            request.extensions_mut().insert(authorization);
            next.run(request).await
        }
        Err(reason) => {
            tracing::debug!("❌ Admin gate refused request: {:?}", reason);
            reason.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use zeroize::Zeroizing;

    fn admin() -> AdminCredentials {
        AdminCredentials {
            user: "admin".to_string(),
            pass: Zeroizing::new("s3cret".to_string()),
        }
    }

    fn basic(raw: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!("Basic {}", STANDARD.encode(raw));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
        headers
    }

    #[test]
    fn parses_basic_credentials() {
        assert_eq!(
            parse_basic(&basic("admin:s3cret")),
            Some(("admin".to_string(), "s3cret".to_string()))
        );
    }

    #[test]
    fn passwords_may_contain_colons() {
        assert_eq!(
            parse_basic(&basic("admin:a:b")),
            Some(("admin".to_string(), "a:b".to_string()))
        );
    }

    #[test]
    fn other_schemes_and_garbage_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(parse_basic(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        assert_eq!(parse_basic(&headers), None);

        assert_eq!(parse_basic(&basic("no-colon")), None);
        assert_eq!(parse_basic(&HeaderMap::new()), None);
    }

    #[test]
    fn credentials_must_match_exactly() {
        assert!(credentials_match(&admin(), "admin", "s3cret"));
        assert!(!credentials_match(&admin(), "admin", "s3cret "));
        assert!(!credentials_match(&admin(), "Admin", "s3cret"));
        assert!(!credentials_match(&admin(), "", ""));
    }

    #[test]
    fn basic_header_is_checked_against_admin() {
        assert!(basic_matches(&admin(), &basic("admin:s3cret")));
        assert!(!basic_matches(&admin(), &basic("admin:wrong")));
    }
}
