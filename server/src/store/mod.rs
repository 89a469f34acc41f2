//! Persistence seams.
//!
//! Each concern is a trait so handlers and services stay backend agnostic.
//! Two backends implement all of them: [`memory::MemoryStore`] for tests and
//! single-process deployments, and [`postgres::PgStore`] for production.
//!
//! Inventory invariants (`0 <= remaining <= capacity`, reservation state
//! transitions) are enforced *inside* the backend, as a single lock scope or
//! a single conditional SQL statement, never by a read-then-write in callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CommitOutcome, Event, EventFilter, EventUpdate, MonthlyStats, OverallStats, Payment,
    Reservation, ReservationState, ReservationToken, SettlementOutcome, TicketClass,
    TicketClassUpdate, Transition, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("only {remaining} ticket(s) left for ticket class {ticket_class_id}, requested {requested}")]
    InsufficientInventory {
        ticket_class_id: Uuid,
        requested: i32,
        remaining: i32,
    },

    #[error("{0}")]
    InvalidQuantity(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// The state that keeps `reservation` from being committed at `at`, if any.
/// Already committed holds commit again as a no-op.
fn stale_state(reservation: &Reservation, at: DateTime<Utc>) -> Option<ReservationState> {
    let committable =
        reservation.state == ReservationState::Committed || reservation.is_live_at(at);
    (!committable).then_some(reservation.state)
}

/// Events and their ticket classes.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_event(&self, event: Event) -> StoreResult<Event>;
    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Event>;
    /// Removes the event together with its ticket classes and favorites.
    async fn delete_event(&self, id: Uuid) -> StoreResult<Event>;
    async fn get_event(&self, id: Uuid) -> StoreResult<Event>;
    async fn list_events(&self, filter: &EventFilter) -> StoreResult<Vec<Event>>;
    async fn count_events(&self) -> StoreResult<i64>;

    /// Fails with `Conflict` when the event already has this ticket type.
    async fn insert_ticket_class(&self, class: TicketClass) -> StoreResult<TicketClass>;
    async fn update_ticket_class(
        &self,
        id: Uuid,
        update: TicketClassUpdate,
    ) -> StoreResult<TicketClass>;
    async fn delete_ticket_class(&self, id: Uuid) -> StoreResult<TicketClass>;
    async fn get_ticket_class(&self, id: Uuid) -> StoreResult<TicketClass>;
    async fn list_ticket_classes(&self, event_id: Uuid) -> StoreResult<Vec<TicketClass>>;
}

/// Remaining counts and the reservations held against them.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Decrements `remaining` by `reservation.quantity` iff enough is left,
    /// and records the pending reservation, as one atomic step.
    async fn reserve(&self, reservation: Reservation) -> StoreResult<Reservation>;

    async fn get_reservation(&self, token: ReservationToken) -> StoreResult<Reservation>;

    /// `Pending -> Released`, restoring the held quantity. A no-op for
    /// reservations already in a terminal state.
    async fn release(&self, token: ReservationToken, at: DateTime<Utc>)
        -> StoreResult<Transition>;

    /// Commits every token or none. Tokens that are released, or pending
    /// past their expiry at `at`, make the whole call a no-op.
    async fn commit(&self, tokens: &[ReservationToken], at: DateTime<Utc>)
        -> StoreResult<CommitOutcome>;

    /// Releases every pending reservation whose expiry is at or before `now`.
    async fn release_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>>;
}

/// Settled payments and their aggregates.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Commits `tokens` and writes `payment` atomically. When the key is
    /// already taken or a hold is stale, nothing is written and the holds
    /// stay pending; an error likewise leaves no trace.
    async fn commit_and_record(
        &self,
        tokens: &[ReservationToken],
        payment: Payment,
        at: DateTime<Utc>,
    ) -> StoreResult<SettlementOutcome>;
    async fn get_payment(&self, id: Uuid) -> StoreResult<Payment>;
    async fn find_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Payment>>;
    async fn list_payments(&self) -> StoreResult<Vec<Payment>>;
    async fn list_payments_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Payment>>;
    async fn delete_payment(&self, id: Uuid) -> StoreResult<Payment>;

    async fn overall_stats(&self) -> StoreResult<OverallStats>;
    /// Newest month first.
    async fn monthly_stats(&self) -> StoreResult<Vec<MonthlyStats>>;
}

/// User profiles and their favorite events.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: User) -> StoreResult<User>;
    async fn get_user(&self, id: Uuid) -> StoreResult<User>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<User>;
    async fn count_users(&self) -> StoreResult<i64>;

    /// Fails with `NotFound` if the event does not exist.
    async fn add_favorite(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<()>;
    /// Returns whether a favorite was removed.
    async fn remove_favorite(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<bool>;
    async fn favorite_event_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;
}

/// Everything the HTTP layer needs from one backend.
pub trait Backend: CatalogStore + InventoryStore + PaymentStore + UserStore + 'static {}

impl<T> Backend for T where T: CatalogStore + InventoryStore + PaymentStore + UserStore + 'static {}
