use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{EventFilter, EventUpdate, NewEvent};
use crate::state::AppState;
use crate::utils::auth::{MaybeActor, Seller};
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Serialize)]
struct CountPayload {
    total: i64,
}

pub async fn create_event(
    State(state): State<AppState>,
    Seller(_): Seller,
    Json(payload): Json<NewEvent>,
) -> Result<Response, AppError> {
    let event = state.catalog.create_event(payload).await?;
    Ok(created(event, "Event created successfully"))
}

pub async fn list_events(
    State(state): State<AppState>,
    MaybeActor(viewer): MaybeActor,
    Query(filter): Query<EventFilter>,
) -> Result<Response, AppError> {
    let events = state
        .catalog
        .events(&filter, viewer.map(|actor| actor.user_id))
        .await?;
    Ok(success(events, "Events retrieved successfully"))
}

pub async fn count_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let total = state.catalog.count_events().await?;
    Ok(success(CountPayload { total }, "Event count retrieved"))
}

pub async fn get_event(
    State(state): State<AppState>,
    MaybeActor(viewer): MaybeActor,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state
        .catalog
        .event(id, viewer.map(|actor| actor.user_id))
        .await?;
    Ok(success(event, "Event retrieved successfully"))
}

pub async fn update_event(
    State(state): State<AppState>,
    Seller(_): Seller,
    Path(id): Path<Uuid>,
    Json(update): Json<EventUpdate>,
) -> Result<Response, AppError> {
    let event = state.catalog.update_event(id, update).await?;
    Ok(success(event, "Event updated successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Seller(_): Seller,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state.catalog.delete_event(id).await?;
    Ok(success(event, "Event deleted successfully"))
}
