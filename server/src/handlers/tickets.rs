use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::models::{NewTicketClass, TicketClassUpdate};
use crate::state::AppState;
use crate::utils::auth::Seller;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn create_ticket_class(
    State(state): State<AppState>,
    Seller(_): Seller,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<NewTicketClass>,
) -> Result<Response, AppError> {
    let class = state.catalog.create_ticket_class(event_id, payload).await?;
    Ok(created(class, "Ticket created successfully"))
}

pub async fn list_ticket_classes(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let classes = state.catalog.ticket_classes(event_id).await?;
    Ok(success(classes, "Tickets retrieved successfully"))
}

pub async fn get_ticket_class(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let class = state.catalog.ticket_class(id).await?;
    Ok(success(class, "Ticket retrieved successfully"))
}

pub async fn update_ticket_class(
    State(state): State<AppState>,
    Seller(_): Seller,
    Path(id): Path<Uuid>,
    Json(update): Json<TicketClassUpdate>,
) -> Result<Response, AppError> {
    let class = state.catalog.update_ticket_class(id, update).await?;
    Ok(success(class, "Ticket updated successfully"))
}

pub async fn delete_ticket_class(
    State(state): State<AppState>,
    Seller(_): Seller,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let class = state.catalog.delete_ticket_class(id).await?;
    Ok(success(class, "Ticket deleted successfully"))
}
