use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use http::{HeaderValue, Method, header};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    handlers::{self, booking::MAX_ATTACHMENT_BYTES},
    middleware_layer,
    state::AppState,
};

/// Room for multipart boundaries and text fields on top of the file limits.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("⚠️ Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Builds the full HTTP surface.
pub fn router(state: AppState) -> Router {
    let limits = state.config.uploads;
    let upload_limit = limits
        .max_files
        .saturating_mul(limits.max_file_bytes as usize)
        .saturating_add(MULTIPART_OVERHEAD);
    let booking_limit = MAX_ATTACHMENT_BYTES as usize + MULTIPART_OVERHEAD;

    let session_routes = Router::new()
        .route("/api/login", post(handlers::auth::login))
        .route("/api/logout", post(handlers::auth::logout))
        .route("/api/whoami", get(handlers::auth::whoami))
        .route("/api/passcode", post(handlers::passcode::passcode))
        .route("/api/passcode/logout", post(handlers::passcode::passcode_logout))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/", get(handlers::pages::root))
        .route("/admin", get(handlers::pages::admin_page))
        .route("/admin.html", get(handlers::pages::admin_page))
        .route("/health", get(handlers::health::health))
        .route("/api/images", get(handlers::images::list_images))
        .route(
            "/api/booked-dates",
            get(handlers::booked_dates::get_booked_dates).merge(
                post(handlers::booked_dates::update_booked_dates).route_layer(from_fn_with_state(
                    state.clone(),
                    middleware_layer::auth::require_admin,
                )),
            ),
        )
        .route(
            "/api/book",
            post(handlers::booking::book).layer(DefaultBodyLimit::max(booking_limit)),
        )
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route(
            "/api/upload",
            post(handlers::images::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/images/{name}", delete(handlers::images::delete_image))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_admin,
        ))
        .with_state(state.clone());

    let passcode_routes = Router::new()
        .route("/adminmain", get(handlers::pages::admin_main))
        .route("/adminmain.html", get(handlers::pages::admin_main))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::passcode::require_passcode,
        ))
        .with_state(state.clone());

    let static_routes = Router::new()
        .route_service("/{*path}", ServeDir::new(&state.config.storage.public_dir))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::passcode::guard_static_files,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(session_routes)
        .merge(public_routes)
        .merge(admin_routes)
        .merge(passcode_routes)
        .merge(static_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(SetSensitiveRequestHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        .layer(CookieManagerLayer::new())
        .layer(cors_layer(&state.config.cors_origins))
}
