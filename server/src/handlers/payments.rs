use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::auth::{Actor, Role, Seller};
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn list_payments(
    State(state): State<AppState>,
    Seller(_): Seller,
) -> Result<Response, AppError> {
    let payments = state.payments.list_payments().await?;
    Ok(success(payments, "Payments retrieved successfully"))
}

/// Buyers can read their own payments; sellers can read any.
pub async fn get_payment(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let payment = state.payments.get_payment(id).await?;
    if actor.role != Role::Seller && payment.buyer_id != actor.user_id {
        return Err(AppError::Forbidden(
            "You can only view your own payments".to_string(),
        ));
    }
    Ok(success(payment, "Payment retrieved successfully"))
}

pub async fn list_event_payments(
    State(state): State<AppState>,
    Seller(_): Seller,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let payments = state.payments.list_payments_for_event(event_id).await?;
    Ok(success(payments, "Payments retrieved successfully"))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    Seller(seller): Seller,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let payment = state.payments.delete_payment(id).await?;
    tracing::warn!(
        payment_id = %payment.id,
        deleted_by = %seller.user_id,
        "Payment deleted by administrative override"
    );
    Ok(success(payment, "Payment deleted successfully"))
}

pub async fn overall_stats(
    State(state): State<AppState>,
    Seller(_): Seller,
) -> Result<Response, AppError> {
    let stats = state.reporting.overall_stats().await?;
    Ok(success(stats, "Overall stats retrieved successfully"))
}

pub async fn monthly_stats(
    State(state): State<AppState>,
    Seller(_): Seller,
) -> Result<Response, AppError> {
    let stats = state.reporting.monthly_stats().await?;
    Ok(success(stats, "Monthly stats retrieved successfully"))
}
