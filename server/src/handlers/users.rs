use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::models::NewUser;
use crate::state::AppState;
use crate::utils::auth::{Actor, Seller};
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

#[derive(Serialize)]
struct CountPayload {
    total: i64,
}

/// Registers the caller's profile under their forwarded user id.
pub async fn register_user(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<NewUser>,
) -> Result<Response, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;
    let mut user = payload.into_user();
    user.id = actor.user_id;

    let user = state.users.insert_user(user).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(created(user, "User registered successfully"))
}

pub async fn list_users(
    State(state): State<AppState>,
    Seller(_): Seller,
) -> Result<Response, AppError> {
    let users = state.users.list_users().await?;
    Ok(success(users, "Users retrieved successfully"))
}

pub async fn count_users(
    State(state): State<AppState>,
    Seller(_): Seller,
) -> Result<Response, AppError> {
    let total = state.users.count_users().await?;
    Ok(success(CountPayload { total }, "User count retrieved"))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Seller(_): Seller,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let user = state.users.delete_user(id).await?;
    Ok(success(user, "User deleted successfully"))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Response, AppError> {
    let events = state.catalog.favorite_events(actor.user_id).await?;
    Ok(success(events, "Favorite events retrieved successfully"))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    state.users.add_favorite(actor.user_id, event_id).await?;
    Ok(empty_success("Event added to favorites"))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    actor: Actor,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let removed = state.users.remove_favorite(actor.user_id, event_id).await?;
    let message = if removed {
        "Event removed from favorites"
    } else {
        "Event was not a favorite"
    };
    Ok(empty_success(message))
}
