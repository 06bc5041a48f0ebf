use axum::{
    body::Body,
    extract::{Path, Request, State, rejection::PathRejection},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use subtle::ConstantTimeEq;
use tower_cookies::Cookies;

use crate::{error::AppError, middleware_layer::auth::basic_matches, state::AppState};

/// The cookie set once the passcode has been entered.
pub const PASSCODE_COOKIE: &str = "pass_verified";

/// The value stored in the passcode cookie for `passcode`.
pub fn passcode_cookie_value(passcode: &str) -> String {
    STANDARD.encode(passcode)
}

/// Whether `candidate` equals the configured passcode, compared in constant time.
pub fn passcode_matches(expected: &str, candidate: &str) -> bool {
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Files under `PUBLIC_DIR` that are only served behind the passcode.
const GATED_FILES: [&str; 2] = ["adminmain.html", "adminmain"];

/// Whether the request carries the passcode cookie or admin Basic credentials.
///
/// Admin sessions alone do not open this gate.
fn passcode_granted(state: &AppState, cookies: &Cookies, headers: &HeaderMap) -> bool {
    let expected = passcode_cookie_value(&state.config.passcode);

    if let Some(cookie) = cookies.get(PASSCODE_COOKIE) {
        if passcode_matches(&expected, cookie.value()) {
            tracing::debug!("✅ Passcode cookie accepted");
            return true;
        }
        tracing::warn!("❌ Passcode cookie present but does not match");
    }

    if basic_matches(&state.config.admin, headers) {
        tracing::debug!("✅ Passcode gate opened by admin Basic credentials");
        return true;
    }

    false
}

/// A middleware guarding the admin landing page behind the passcode.
pub async fn require_passcode(
    State(state): State<AppState>,
    cookies: Cookies,
    req: Request<Body>,
    next: Next,
) -> Response {
    if passcode_granted(&state, &cookies, req.headers()) {
        return next.run(req).await;
    }

    AppError::Authentication("Passcode required".to_string()).into_response()
}

/// Resolves a decoded request path the way a file server would: empty and
/// `.` segments vanish and `..` drops the previous segment.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Whether `path` names a file that must stay behind the passcode.
pub fn is_gated_file(path: &str) -> bool {
    let normalized = normalize_path(path);
    GATED_FILES
        .iter()
        .any(|gated| normalized.eq_ignore_ascii_case(gated))
}

/// A middleware on the static file route applying the passcode gate to any
/// spelling of the landing page.
pub async fn guard_static_files(
    State(state): State<AppState>,
    cookies: Cookies,
    path: Result<Path<String>, PathRejection>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Path(path) = match path {
        Ok(path) => path,
        Err(e) => return AppError::Validation(e.body_text()).into_response(),
    };

    if is_gated_file(&path) && !passcode_granted(&state, &cookies, req.headers()) {
        tracing::warn!("❌ Static request for a gated page without the passcode: {}", path);
        return AppError::Authentication("Passcode required".to_string()).into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_value_is_base64_of_passcode() {
        assert_eq!(passcode_cookie_value("change-me"), "Y2hhbmdlLW1l");
    }

    #[test]
    fn gated_files_are_recognized_in_any_spelling() {
        for path in [
            "adminmain.html",
            "./adminmain.html",
            "uploads/../adminmain.html",
            "ADMINMAIN.HTML",
            "//adminmain",
        ] {
            assert!(is_gated_file(path), "{path}");
        }
        for path in ["admin.html", "uploads/adminmain.html", "adminmain.html.bak"] {
            assert!(!is_gated_file(path), "{path}");
        }
    }

    #[test]
    fn passcode_comparison_is_exact() {
        assert!(passcode_matches("open", "open"));
        assert!(!passcode_matches("open", "ope"));
        assert!(!passcode_matches("open", "OPEN"));
    }
}
