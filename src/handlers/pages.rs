use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use axum::{
    extract::State,
    response::{Html, Redirect},
};

use crate::{
    error::{AppError, Result},
    state::AppState,
};

pub async fn root() -> Redirect {
    Redirect::to("/adminmain")
}

/// Serves the admin page from `PUBLIC_DIR`, falling back to the working directory.
pub async fn admin_page(State(state): State<AppState>) -> Result<Html<String>> {
    let candidates = [
        state.config.storage.public_dir.join("admin.html"),
        PathBuf::from("admin.html"),
    ];

    for candidate in &candidates {
        if let Some(page) = read_page(candidate).await? {
            return Ok(Html(page));
        }
    }

    Err(AppError::NotFound("Admin page not found".to_string()))
}

/// Serves the admin landing page. Mounted behind the passcode gate.
pub async fn admin_main(State(state): State<AppState>) -> Result<Html<String>> {
    let path = state.config.storage.public_dir.join("adminmain.html");
    read_page(&path)
        .await?
        .map(Html)
        .ok_or_else(|| AppError::NotFound("Page not found".to_string()))
}

async fn read_page(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(page) => Ok(Some(page)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
