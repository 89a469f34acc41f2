//! The inventory ledger: the single source of truth for how many tickets of
//! a class are left.
//!
//! Every hold goes through [`InventoryLedger::reserve`] and ends in exactly
//! one of `commit`, `release` or the expiry sweep. Whichever acts first on a
//! token wins; later attempts are no-ops.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{CommitOutcome, Reservation, ReservationToken, Transition};
use crate::store::{InventoryStore, StoreError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("insufficient inventory for ticket class {ticket_class_id}: requested {requested}, remaining {remaining}")]
    InsufficientInventory {
        ticket_class_id: Uuid,
        requested: i32,
        remaining: i32,
    },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientInventory {
                ticket_class_id,
                requested,
                remaining,
            } => LedgerError::InsufficientInventory {
                ticket_class_id,
                requested,
                remaining,
            },
            StoreError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            other => LedgerError::Store(other),
        }
    }
}

pub struct InventoryLedger {
    store: Arc<dyn InventoryStore>,
    ttl: chrono::Duration,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn InventoryStore>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(15));
        Self { store, ttl }
    }

    /// Holds `quantity` tickets of a class until committed, released or
    /// expired. Never oversells: two callers racing for the last ticket get
    /// exactly one success.
    pub async fn reserve(
        &self,
        ticket_class_id: Uuid,
        quantity: i32,
    ) -> Result<Reservation, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity(quantity));
        }

        match self
            .store
            .reserve(Reservation::pending(ticket_class_id, quantity, self.ttl))
            .await
        {
            Ok(reservation) => {
                debug!(
                    reservation_id = %reservation.id,
                    ticket_class_id = %ticket_class_id,
                    quantity,
                    expires_at = %reservation.expires_at,
                    "Reserved tickets"
                );
                Ok(reservation)
            }
            Err(err) => {
                let err = LedgerError::from(err);
                if let LedgerError::InsufficientInventory { remaining, .. } = &err {
                    info!(
                        ticket_class_id = %ticket_class_id,
                        quantity,
                        remaining,
                        "Reservation refused: insufficient inventory"
                    );
                }
                Err(err)
            }
        }
    }

    /// Returns a hold to inventory. Releasing a token that is already
    /// released or committed changes nothing.
    pub async fn release(&self, token: ReservationToken) -> Result<Transition, LedgerError> {
        let transition = self.store.release(token, Utc::now()).await?;
        if transition.applied {
            debug!(
                reservation_id = %token,
                ticket_class_id = %transition.reservation.ticket_class_id,
                quantity = transition.reservation.quantity,
                "Released reservation"
            );
        } else {
            debug!(
                reservation_id = %token,
                state = ?transition.reservation.state,
                "Release was a no-op"
            );
        }
        Ok(transition)
    }

    pub async fn commit(&self, token: ReservationToken) -> Result<CommitOutcome, LedgerError> {
        self.commit_all(&[token]).await
    }

    /// Commits every token or none of them.
    pub async fn commit_all(
        &self,
        tokens: &[ReservationToken],
    ) -> Result<CommitOutcome, LedgerError> {
        let outcome = self.store.commit(tokens, Utc::now()).await?;
        match outcome {
            CommitOutcome::Committed => {
                debug!(reservations = tokens.len(), "Committed reservations")
            }
            CommitOutcome::Stale { token, state } => {
                warn!(reservation_id = %token, state = ?state, "Commit refused: reservation no longer held")
            }
        }
        Ok(outcome)
    }

    pub async fn reservation(&self, token: ReservationToken) -> Result<Reservation, LedgerError> {
        Ok(self.store.get_reservation(token).await?)
    }

    /// Best-effort release of several holds, used when unwinding a failed
    /// settlement. Failures are logged, never returned.
    pub async fn release_all(&self, tokens: &[ReservationToken]) {
        for token in tokens {
            if let Err(err) = self.release(*token).await {
                error!(reservation_id = %token, error = %err, "Failed to release reservation");
            }
        }
    }

    /// Releases every hold whose expiry has passed at `now`.
    pub async fn sweep_expired_at(
        &self,
        now: chrono::DateTime<Utc>,
    ) -> Result<usize, LedgerError> {
        let released = self.store.release_expired(now).await?;
        if !released.is_empty() {
            info!(count = released.len(), "Released expired reservations");
        }
        Ok(released.len())
    }

    pub async fn sweep_expired(&self) -> Result<usize, LedgerError> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Runs the expiry sweep every `period` until `shutdown` flips to true.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period = ?period, "Starting reservation expiry sweeper");
            let mut ticker = interval(period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep_expired().await {
                            warn!(error = %err, "Reservation expiry sweep failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Reservation expiry sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEvent, NewTicketClass, ReservationState, TicketClass};
    use crate::store::{CatalogStore, MemoryStore};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    async fn setup(capacity: i32) -> (Arc<MemoryStore>, Arc<InventoryLedger>, TicketClass) {
        let store = Arc::new(MemoryStore::new());
        let event = store
            .insert_event(
                NewEvent {
                    topic: "Festival".to_string(),
                    description: "Three stages".to_string(),
                    venue: "Riverside".to_string(),
                    time: "12:00".to_string(),
                    date: NaiveDate::from_ymd_opt(2025, 8, 2).unwrap(),
                    category: "Music".to_string(),
                    image: None,
                }
                .into_event(),
            )
            .await
            .unwrap();
        let class = store
            .insert_ticket_class(
                NewTicketClass {
                    ticket_type: "Weekend".to_string(),
                    description: None,
                    price: Decimal::new(500, 0),
                    capacity,
                }
                .into_ticket_class(event.id),
            )
            .await
            .unwrap();
        let ledger = Arc::new(InventoryLedger::new(
            store.clone(),
            Duration::from_secs(15 * 60),
        ));
        (store, ledger, class)
    }

    async fn remaining(store: &MemoryStore, class: &TicketClass) -> i32 {
        store.get_ticket_class(class.id).await.unwrap().remaining
    }

    #[tokio::test]
    async fn test_reserve_and_release_walkthrough() {
        let (store, ledger, class) = setup(10).await;

        let first = ledger.reserve(class.id, 7).await.unwrap();
        assert_eq!(remaining(&store, &class).await, 3);

        let err = ledger.reserve(class.id, 5).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientInventory { requested: 5, remaining: 3, .. }
        ));
        assert_eq!(remaining(&store, &class).await, 3);

        ledger.release(first.token()).await.unwrap();
        assert_eq!(remaining(&store, &class).await, 10);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (store, ledger, class) = setup(4).await;
        let held = ledger.reserve(class.id, 2).await.unwrap();

        assert!(ledger.release(held.token()).await.unwrap().applied);
        let again = ledger.release(held.token()).await.unwrap();
        assert!(!again.applied);
        assert_eq!(again.reservation.state, ReservationState::Released);
        assert_eq!(remaining(&store, &class).await, 4);
    }

    #[tokio::test]
    async fn test_commit_prevents_later_release() {
        let (store, ledger, class) = setup(4).await;
        let held = ledger.reserve(class.id, 3).await.unwrap();

        assert_eq!(
            ledger.commit(held.token()).await.unwrap(),
            CommitOutcome::Committed
        );
        let release = ledger.release(held.token()).await.unwrap();
        assert!(!release.applied);
        assert_eq!(release.reservation.state, ReservationState::Committed);
        assert_eq!(remaining(&store, &class).await, 1);

        // Committing twice is also a no-op.
        assert_eq!(
            ledger.commit(held.token()).await.unwrap(),
            CommitOutcome::Committed
        );
    }

    #[tokio::test]
    async fn test_commit_after_release_is_stale() {
        let (_store, ledger, class) = setup(4).await;
        let held = ledger.reserve(class.id, 1).await.unwrap();
        ledger.release(held.token()).await.unwrap();

        assert_eq!(
            ledger.commit(held.token()).await.unwrap(),
            CommitOutcome::Stale {
                token: held.token(),
                state: ReservationState::Released
            }
        );
    }

    #[tokio::test]
    async fn test_expired_hold_is_swept_and_cannot_commit() {
        let (store, ledger, class) = setup(6).await;
        let held = ledger.reserve(class.id, 6).await.unwrap();
        assert_eq!(remaining(&store, &class).await, 0);

        let later = held.expires_at + chrono::Duration::seconds(1);
        assert_eq!(ledger.sweep_expired_at(later).await.unwrap(), 1);
        assert_eq!(remaining(&store, &class).await, 6);

        let outcome = ledger.commit(held.token()).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::Stale { .. }));

        // A second sweep finds nothing left to do.
        assert_eq!(ledger.sweep_expired_at(later).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let (_store, ledger, class) = setup(6).await;
        assert!(matches!(
            ledger.reserve(class.id, 0).await,
            Err(LedgerError::InvalidQuantity(0))
        ));
    }

    #[tokio::test]
    async fn test_unknown_ticket_class() {
        let (_store, ledger, _class) = setup(6).await;
        assert!(matches!(
            ledger.reserve(Uuid::new_v4(), 1).await,
            Err(LedgerError::NotFound { entity: "TicketClass", .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserves_never_oversell() {
        let (store, ledger, class) = setup(7).await;

        let attempts: Vec<_> = (0..50)
            .map(|_| {
                let ledger = ledger.clone();
                let class_id = class.id;
                tokio::spawn(async move { ledger.reserve(class_id, 1).await })
            })
            .collect();

        let mut succeeded = 0;
        let mut refused = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(LedgerError::InsufficientInventory { .. }) => refused += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 7);
        assert_eq!(refused, 43);
        assert_eq!(remaining(&store, &class).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_commit_release_and_sweep_resolve_once() {
        let (store, ledger, class) = setup(20).await;

        let mut holds = Vec::new();
        for _ in 0..20 {
            holds.push(ledger.reserve(class.id, 1).await.unwrap());
        }
        let far_future = Utc::now() + chrono::Duration::hours(1);

        let mut tasks = Vec::new();
        for hold in &holds {
            let token = hold.token();
            let (a, b) = (ledger.clone(), ledger.clone());
            tasks.push(tokio::spawn(async move {
                let _ = a.commit(token).await;
            }));
            tasks.push(tokio::spawn(async move {
                let _ = b.release(token).await;
            }));
        }
        let sweeper = ledger.clone();
        tasks.push(tokio::spawn(async move {
            let _ = sweeper.sweep_expired_at(far_future).await;
        }));
        for task in tasks {
            task.await.unwrap();
        }

        let mut committed = 0;
        for hold in &holds {
            let state = ledger.reservation(hold.token()).await.unwrap().state;
            assert!(state.is_terminal());
            if state == ReservationState::Committed {
                committed += 1;
            }
        }
        // Every committed hold is still consumed, every other one came back.
        assert_eq!(remaining(&store, &class).await, 20 - committed);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let (_store, ledger, _class) = setup(1).await;
        let (tx, rx) = watch::channel(false);
        let handle = ledger.spawn_sweeper(Duration::from_millis(10), rx);

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
