use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::services::{CatalogError, LedgerError, OrderError, SettlementError};
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Insufficient inventory: {message}")]
    InsufficientInventory { ticket_class_id: Uuid, message: String },

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Duplicate settlement: {0}")]
    DuplicateSettlement(String),

    #[error("Reservation expired: {0}")]
    ReservationExpired(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidQuantity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InsufficientInventory { .. } => StatusCode::CONFLICT,
            AppError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::DuplicateSettlement(_) => StatusCode::CONFLICT,
            AppError::ReservationExpired(_) => StatusCode::CONFLICT,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidQuantity(_) => "INVALID_QUANTITY",
            AppError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            AppError::PaymentDeclined(_) => "PAYMENT_DECLINED",
            AppError::DuplicateSettlement(_) => "DUPLICATE_SETTLEMENT",
            AppError::ReservationExpired(_) => "RESERVATION_EXPIRED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Machine-readable context for errors a client can act on.
    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::InsufficientInventory {
                ticket_class_id, ..
            } => Some(json!({ "ticketClassId": ticket_class_id })),
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidQuantity(msg)
            | AppError::PaymentDeclined(msg)
            | AppError::DuplicateSettlement(msg)
            | AppError::ReservationExpired(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::InsufficientInventory { message, .. } => message.clone(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
        }
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::InternalServerError(msg) => {
                error!(message = %msg, "Internal server error");
            }
            other => {
                warn!(code = other.code(), message = %other.public_message(), "Request failed");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        error_response(code, self.public_message(), self.details(), status)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::InsufficientInventory {
                ticket_class_id, ..
            } => AppError::InsufficientInventory {
                ticket_class_id,
                message: err.to_string(),
            },
            StoreError::InvalidQuantity(msg) => AppError::InvalidQuantity(msg),
            StoreError::Database(e) => AppError::DatabaseError(e),
            StoreError::Poisoned => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidQuantity(_) => AppError::InvalidQuantity(err.to_string()),
            LedgerError::InsufficientInventory {
                ticket_class_id, ..
            } => AppError::InsufficientInventory {
                ticket_class_id,
                message: err.to_string(),
            },
            LedgerError::NotFound { .. } => AppError::NotFound(err.to_string()),
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NonPositiveQuantity { .. }
            | OrderError::ExceedsAdvertised { .. }
            | OrderError::QuantityOverflow => {
                AppError::InvalidQuantity(err.to_string())
            }
            OrderError::UnknownTicketClass(_) => AppError::NotFound(err.to_string()),
            OrderError::Empty | OrderError::MixedEvents => {
                AppError::ValidationError(err.to_string())
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(msg) => AppError::ValidationError(msg),
            CatalogError::Store(e) => e.into(),
        }
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::Validation(msg) => AppError::ValidationError(msg),
            SettlementError::InvalidQuantity(msg) => AppError::InvalidQuantity(msg),
            SettlementError::NotFound { .. } => AppError::NotFound(err.to_string()),
            SettlementError::InsufficientInventory {
                ticket_class_id, ..
            } => AppError::InsufficientInventory {
                ticket_class_id,
                message: err.to_string(),
            },
            SettlementError::PaymentDeclined(_) => AppError::PaymentDeclined(err.to_string()),
            SettlementError::DuplicateSettlement { .. } => {
                AppError::DuplicateSettlement(err.to_string())
            }
            SettlementError::ReservationExpired { .. } => {
                AppError::ReservationExpired(err.to_string())
            }
            SettlementError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_insufficient_inventory_carries_ticket_class() {
        let id = Uuid::new_v4();
        let response = AppError::from(StoreError::InsufficientInventory {
            ticket_class_id: id,
            requested: 3,
            remaining: 1,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "INSUFFICIENT_INVENTORY");
        assert_eq!(json["error"]["details"]["ticketClassId"], id.to_string());
    }

    #[tokio::test]
    async fn test_database_details_are_hidden() {
        let response = AppError::DatabaseError(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["message"], "A database error occurred");
        assert!(json["error"]["details"].is_null());
    }

    #[test]
    fn test_settlement_errors_map_to_status_codes() {
        let cases = [
            (
                AppError::from(SettlementError::PaymentDeclined("no funds".into())),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                AppError::from(SettlementError::DuplicateSettlement {
                    idempotency_key: "k".into(),
                }),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(SettlementError::InvalidQuantity("bad".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(OrderError::MixedEvents),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(OrderError::QuantityOverflow),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(SettlementError::from(OrderError::QuantityOverflow)),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err.code());
        }
    }
}
