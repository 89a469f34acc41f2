//! Settlement: turns a cart into a durable payment, all or nothing.
//!
//! 1. Reserve every line through the inventory ledger; any refusal releases
//!    what was already held.
//! 2. Price the order from current catalog prices.
//! 3. Ask the payment gateway to confirm the charge, bounded by a timeout.
//! 4. Commit every hold and write the payment record in one store step.
//!
//! Until step 4 succeeds, a failure leaves inventory exactly as it was and
//! any confirmed charge is refunded.
//! A retried request with the same idempotency key returns the original
//! payment without reserving or charging again.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::gateway::{Confirmation, PaymentGateway, PaymentIntent};
use super::inventory::{InventoryLedger, LedgerError};
use super::order::{self, OrderError};
use crate::models::{
    Event, Order, OrderRequestLine, Payment, ReservationToken, SettlementOutcome,
};
use crate::store::{CatalogStore, PaymentStore, StoreError};

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidQuantity(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("insufficient inventory for ticket class {ticket_class_id}")]
    InsufficientInventory {
        ticket_class_id: Uuid,
        requested: i32,
        remaining: i32,
    },

    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    #[error("idempotency key '{idempotency_key}' was already used for a different order")]
    DuplicateSettlement { idempotency_key: String },

    #[error("reservation {token} expired before settlement completed")]
    ReservationExpired { token: ReservationToken },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SettlementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => SettlementError::NotFound { entity, id },
            StoreError::InvalidQuantity(message) => SettlementError::InvalidQuantity(message),
            StoreError::InsufficientInventory {
                ticket_class_id,
                requested,
                remaining,
            } => SettlementError::InsufficientInventory {
                ticket_class_id,
                requested,
                remaining,
            },
            other => SettlementError::Store(other),
        }
    }
}

impl From<LedgerError> for SettlementError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidQuantity(quantity) => {
                SettlementError::InvalidQuantity(format!("Quantity must be positive, got {}", quantity))
            }
            LedgerError::InsufficientInventory {
                ticket_class_id,
                requested,
                remaining,
            } => SettlementError::InsufficientInventory {
                ticket_class_id,
                requested,
                remaining,
            },
            LedgerError::NotFound { entity, id } => SettlementError::NotFound { entity, id },
            LedgerError::Store(err) => SettlementError::from(err),
        }
    }
}

impl From<OrderError> for SettlementError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NonPositiveQuantity { .. }
            | OrderError::ExceedsAdvertised { .. }
            | OrderError::QuantityOverflow => {
                SettlementError::InvalidQuantity(err.to_string())
            }
            OrderError::UnknownTicketClass(id) => SettlementError::NotFound {
                entity: "TicketClass",
                id: id.to_string(),
            },
            OrderError::Empty | OrderError::MixedEvents => {
                SettlementError::Validation(err.to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub idempotency_key: String,
    pub buyer_id: Uuid,
    pub buyer_name: String,
    pub lines: Vec<OrderRequestLine>,
    /// Advisory total shown to the buyer; compared, never charged.
    pub expected_total: Option<Decimal>,
}

/// Serializes settlements that share an idempotency key.
#[derive(Default)]
struct KeyLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &str) -> KeyGuard<'_> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(key.to_string()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        KeyGuard {
            locks: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.key);
        }
    }
}

pub struct SettlementEngine {
    catalog: Arc<dyn CatalogStore>,
    payments: Arc<dyn PaymentStore>,
    ledger: Arc<InventoryLedger>,
    gateway: Arc<dyn PaymentGateway>,
    payment_timeout: Duration,
    key_locks: KeyLocks,
}

impl SettlementEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        payments: Arc<dyn PaymentStore>,
        ledger: Arc<InventoryLedger>,
        gateway: Arc<dyn PaymentGateway>,
        payment_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            payments,
            ledger,
            gateway,
            payment_timeout,
            key_locks: KeyLocks::default(),
        }
    }

    pub async fn settle(&self, request: SettlementRequest) -> Result<Payment, SettlementError> {
        if request.idempotency_key.trim().is_empty() {
            return Err(SettlementError::Validation(
                "Idempotency key is required".to_string(),
            ));
        }
        if request.buyer_name.trim().is_empty() {
            return Err(SettlementError::Validation(
                "Buyer name is required".to_string(),
            ));
        }
        let lines = order::normalize(&request.lines)?;

        let _key = self.key_locks.acquire(&request.idempotency_key).await;

        if let Some(existing) = self
            .payments
            .find_by_idempotency_key(&request.idempotency_key)
            .await?
        {
            return Self::replay(existing, &request, &lines);
        }

        let tokens = self.reserve_all(&lines).await?;

        let (order, event) = match self.price(&lines).await {
            Ok(priced) => priced,
            Err(err) => {
                self.ledger.release_all(&tokens).await;
                return Err(err);
            }
        };
        if let Some(expected) = request.expected_total {
            if expected != order.total {
                warn!(
                    idempotency_key = %request.idempotency_key,
                    expected = %expected,
                    total = %order.total,
                    "Client total differs from catalog total; charging catalog total"
                );
            }
        }

        let payment_id = Uuid::new_v4();
        let confirmation = match self.confirm(payment_id, &request, &order).await {
            Ok(confirmation) => confirmation,
            Err(err) => {
                self.ledger.release_all(&tokens).await;
                return Err(err);
            }
        };

        let payment = Payment::settle(
            payment_id,
            request.idempotency_key.clone(),
            request.buyer_id,
            request.buyer_name.trim().to_string(),
            event.topic,
            order,
        );

        let outcome = self
            .payments
            .commit_and_record(&tokens, payment, Utc::now())
            .await;
        match outcome {
            Ok(SettlementOutcome::Recorded(payment)) => {
                info!(
                    payment_id = %payment.id,
                    idempotency_key = %payment.idempotency_key,
                    event_id = %payment.event_id,
                    tickets = payment.ticket_count,
                    amount = %payment.total_amount,
                    "Settlement completed"
                );
                Ok(payment)
            }
            Ok(SettlementOutcome::Stale { token, .. }) => {
                self.unwind(&tokens, &confirmation).await;
                Err(SettlementError::ReservationExpired { token })
            }
            Ok(SettlementOutcome::KeyTaken(existing)) => {
                self.unwind(&tokens, &confirmation).await;
                warn!(
                    idempotency_key = %request.idempotency_key,
                    winner = %existing.id,
                    "Idempotency key settled concurrently; refunded duplicate charge"
                );
                Self::replay(existing, &request, &lines)
            }
            Err(err) => {
                self.unwind(&tokens, &confirmation).await;
                error!(
                    payment_id = %payment_id,
                    idempotency_key = %request.idempotency_key,
                    reference = %confirmation.reference,
                    error = %err,
                    "Failed to record settlement; holds released and charge refunded"
                );
                Err(err.into())
            }
        }
    }

    /// Undoes a confirmed charge whose holds were never committed.
    async fn unwind(&self, tokens: &[ReservationToken], confirmation: &Confirmation) {
        self.ledger.release_all(tokens).await;
        self.refund(confirmation).await;
    }

    fn replay(
        existing: Payment,
        request: &SettlementRequest,
        lines: &[OrderRequestLine],
    ) -> Result<Payment, SettlementError> {
        if existing.matches_order(request.buyer_id, lines) {
            info!(
                payment_id = %existing.id,
                idempotency_key = %request.idempotency_key,
                "Replayed settlement for known idempotency key"
            );
            Ok(existing)
        } else {
            warn!(
                idempotency_key = %request.idempotency_key,
                "Idempotency key reused with a different order"
            );
            Err(SettlementError::DuplicateSettlement {
                idempotency_key: request.idempotency_key.clone(),
            })
        }
    }

    async fn reserve_all(
        &self,
        lines: &[OrderRequestLine],
    ) -> Result<Vec<ReservationToken>, SettlementError> {
        let mut tokens = Vec::with_capacity(lines.len());
        for line in lines {
            match self.ledger.reserve(line.ticket_class_id, line.quantity).await {
                Ok(reservation) => tokens.push(reservation.token()),
                Err(err) => {
                    self.ledger.release_all(&tokens).await;
                    return Err(err.into());
                }
            }
        }
        Ok(tokens)
    }

    async fn price(&self, lines: &[OrderRequestLine]) -> Result<(Order, Event), SettlementError> {
        let mut classes = Vec::with_capacity(lines.len());
        for line in lines {
            classes.push(self.catalog.get_ticket_class(line.ticket_class_id).await?);
        }
        let order = order::price(lines, &classes)?;
        let event = self.catalog.get_event(order.event_id).await?;
        Ok((order, event))
    }

    async fn confirm(
        &self,
        payment_id: Uuid,
        request: &SettlementRequest,
        order: &Order,
    ) -> Result<Confirmation, SettlementError> {
        let intent = PaymentIntent {
            payment_id,
            buyer_id: request.buyer_id,
            amount: order.total,
            idempotency_key: request.idempotency_key.clone(),
        };

        match tokio::time::timeout(self.payment_timeout, self.gateway.confirm(&intent)).await {
            Ok(Ok(confirmation)) => Ok(confirmation),
            Ok(Err(err)) => {
                info!(payment_id = %payment_id, error = %err, "Payment not confirmed");
                Err(SettlementError::PaymentDeclined(err.to_string()))
            }
            Err(_) => {
                warn!(
                    payment_id = %payment_id,
                    timeout = ?self.payment_timeout,
                    "Payment confirmation timed out"
                );
                Err(SettlementError::PaymentDeclined(
                    "payment confirmation timed out".to_string(),
                ))
            }
        }
    }

    async fn refund(&self, confirmation: &Confirmation) {
        if let Err(err) = self.gateway.refund(confirmation).await {
            error!(
                payment_id = %confirmation.payment_id,
                reference = %confirmation.reference,
                error = %err,
                "Refund failed; manual reconciliation required"
            );
        }
    }
}
