use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::{CheckoutRequest, CommitOutcome, QuoteRequest, ReservationToken, ReserveRequest};
use crate::services::order;
use crate::services::SettlementRequest;
use crate::state::AppState;
use crate::utils::auth::{Actor, IdempotencyKey};
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

/// Prices a cart against current catalog prices and advertised counts.
pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Response, AppError> {
    let ids: Vec<Uuid> = request
        .lines
        .iter()
        .map(|line| line.ticket_class_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let classes = state.catalog.ticket_classes_by_id(&ids).await?;
    let order = order::build_order(&request.lines, &classes)?;
    Ok(success(order, "Order priced successfully"))
}

pub async fn reserve(
    State(state): State<AppState>,
    _actor: Actor,
    Json(request): Json<ReserveRequest>,
) -> Result<Response, AppError> {
    let reservation = state
        .ledger
        .reserve(request.ticket_class_id, request.quantity)
        .await?;
    Ok(created(reservation, "Tickets reserved"))
}

pub async fn commit_reservation(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    match state.ledger.commit(ReservationToken(id)).await? {
        CommitOutcome::Committed => {
            let reservation = state.ledger.reservation(ReservationToken(id)).await?;
            Ok(success(reservation, "Reservation committed"))
        }
        CommitOutcome::Stale {
            token,
            state: current,
        } => Err(AppError::ReservationExpired(format!(
            "Reservation {} can no longer be committed (state: {:?})",
            token, current
        ))),
    }
}

pub async fn release_reservation(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let transition = state.ledger.release(ReservationToken(id)).await?;
    let message = if transition.applied {
        "Reservation released"
    } else {
        "Reservation was already resolved"
    };
    Ok(success(transition, message))
}

pub async fn checkout(
    State(state): State<AppState>,
    actor: Actor,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(request): Json<CheckoutRequest>,
) -> Result<Response, AppError> {
    let payment = state
        .settlement
        .settle(SettlementRequest {
            idempotency_key,
            buyer_id: actor.user_id,
            buyer_name: request.buyer_name,
            lines: request.lines,
            expected_total: request.expected_total,
        })
        .await?;
    Ok(success(payment, "Payment completed successfully"))
}
