use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    repositories::booked_dates::{DateAction, stringify_dates},
    state::AppState,
    validation::json::JsonBody,
};

#[derive(Deserialize, Debug, Default)]
pub struct BookedDatesRequest {
    /// `set`, `add` or `remove`; defaults to `set`.
    pub action: Option<String>,
    /// Non-string entries are stored as their JSON text.
    pub dates: Option<Vec<sonic_rs::Value>>,
}

#[derive(Serialize)]
pub struct BookedDatesResponse {
    pub dates: Vec<String>,
}

pub async fn get_booked_dates(State(state): State<AppState>) -> Json<BookedDatesResponse> {
    Json(BookedDatesResponse {
        dates: state.booked_dates.read().await,
    })
}

/// Mutates the ledger and returns the stored result.
pub async fn update_booked_dates(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<BookedDatesRequest>,
) -> Result<Json<BookedDatesResponse>> {
    let action: DateAction = payload.action.as_deref().unwrap_or("set").parse()?;
    let dates = stringify_dates(&payload.dates.unwrap_or_default());

    tracing::info!("📅 Booked dates {:?} with {} dates", action, dates.len());
    let dates = state.booked_dates.apply(action, dates).await?;

    Ok(Json(BookedDatesResponse { dates }))
}
