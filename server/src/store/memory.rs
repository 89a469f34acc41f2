//! Process-local backend.
//!
//! All state sits behind one `RwLock`, so every trait method is a single
//! critical section: a reserve's check and decrement cannot interleave with
//! another reserve, release, commit or sweep.
//!
//! Resolved reservations are kept for a day after they are committed or
//! released and then dropped by the expiry sweep; a token older than that
//! reads as not found.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{
    stale_state, CatalogStore, InventoryStore, PaymentStore, StoreError, StoreResult, UserStore,
};
use crate::models::{
    CommitOutcome, Event, EventFilter, EventUpdate, MonthlyStats, OverallStats, Payment,
    Reservation, ReservationState, ReservationToken, SettlementOutcome, TicketClass,
    TicketClassUpdate, Transition, User,
};
use crate::services::reporting;

const RESOLVED_RETENTION_HOURS: i64 = 24;

#[derive(Default)]
struct State {
    events: HashMap<Uuid, Event>,
    ticket_classes: HashMap<Uuid, TicketClass>,
    reservations: HashMap<Uuid, Reservation>,
    /// Insertion order, oldest first.
    payments: Vec<Payment>,
    users: HashMap<Uuid, User>,
    favorites: HashSet<(Uuid, Uuid)>,
}

impl State {
    fn resolve(&mut self, id: Uuid, to: ReservationState, at: DateTime<Utc>) -> Option<Reservation> {
        let reservation = self.reservations.get_mut(&id)?;
        if reservation.state != ReservationState::Pending {
            return None;
        }
        reservation.state = to;
        reservation.resolved_at = Some(at);
        let resolved = reservation.clone();

        if to == ReservationState::Released {
            // The class may have been deleted while the hold was open.
            if let Some(class) = self.ticket_classes.get_mut(&resolved.ticket_class_id) {
                class.remaining = (class.remaining + resolved.quantity).min(class.capacity);
            }
        }

        Some(resolved)
    }

    /// The first token that can no longer be committed at `at`.
    fn first_stale(
        &self,
        tokens: &[ReservationToken],
        at: DateTime<Utc>,
    ) -> StoreResult<Option<(ReservationToken, ReservationState)>> {
        for token in tokens {
            let reservation = self
                .reservations
                .get(&token.id())
                .ok_or_else(|| StoreError::not_found("Reservation", token))?;
            if let Some(current) = stale_state(reservation, at) {
                return Ok(Some((*token, current)));
            }
        }
        Ok(None)
    }

    fn commit_all(&mut self, tokens: &[ReservationToken], at: DateTime<Utc>) {
        for token in tokens {
            self.resolve(token.id(), ReservationState::Committed, at);
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_event(&self, event: Event) -> StoreResult<Event> {
        let mut state = self.write()?;
        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Event> {
        let mut state = self.write()?;
        let event = state
            .events
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Event", id))?;
        update.apply(event);
        Ok(event.clone())
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<Event> {
        let mut state = self.write()?;
        let event = state
            .events
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("Event", id))?;
        state.ticket_classes.retain(|_, class| class.event_id != id);
        state.favorites.retain(|(_, event_id)| *event_id != id);
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Event> {
        self.read()?
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Event", id))
    }

    async fn list_events(&self, filter: &EventFilter) -> StoreResult<Vec<Event>> {
        let state = self.read()?;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.topic.cmp(&b.topic)));
        Ok(events)
    }

    async fn count_events(&self) -> StoreResult<i64> {
        Ok(self.read()?.events.len() as i64)
    }

    async fn insert_ticket_class(&self, class: TicketClass) -> StoreResult<TicketClass> {
        let mut state = self.write()?;
        if !state.events.contains_key(&class.event_id) {
            return Err(StoreError::not_found("Event", class.event_id));
        }
        let duplicate = state
            .ticket_classes
            .values()
            .any(|c| c.event_id == class.event_id && c.ticket_type == class.ticket_type);
        if duplicate {
            return Err(StoreError::Conflict(
                "A ticket for this event type already exists".to_string(),
            ));
        }
        state.ticket_classes.insert(class.id, class.clone());
        Ok(class)
    }

    async fn update_ticket_class(
        &self,
        id: Uuid,
        update: TicketClassUpdate,
    ) -> StoreResult<TicketClass> {
        let mut state = self.write()?;
        let current = state
            .ticket_classes
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("TicketClass", id))?;

        if let Some(ticket_type) = update.ticket_type.as_deref().map(str::trim) {
            let taken = state.ticket_classes.values().any(|c| {
                c.id != id && c.event_id == current.event_id && c.ticket_type == ticket_type
            });
            if taken {
                return Err(StoreError::Conflict(
                    "A ticket for this event type already exists".to_string(),
                ));
            }
        }

        let next = update.apply(&current).ok_or_else(|| {
            StoreError::InvalidQuantity(format!(
                "Capacity cannot drop below the {} ticket(s) already sold or held",
                current.sold_or_held()
            ))
        })?;
        state.ticket_classes.insert(id, next.clone());
        Ok(next)
    }

    async fn delete_ticket_class(&self, id: Uuid) -> StoreResult<TicketClass> {
        self.write()?
            .ticket_classes
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("TicketClass", id))
    }

    async fn get_ticket_class(&self, id: Uuid) -> StoreResult<TicketClass> {
        self.read()?
            .ticket_classes
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("TicketClass", id))
    }

    async fn list_ticket_classes(&self, event_id: Uuid) -> StoreResult<Vec<TicketClass>> {
        let state = self.read()?;
        if !state.events.contains_key(&event_id) {
            return Err(StoreError::not_found("Event", event_id));
        }
        let mut classes: Vec<TicketClass> = state
            .ticket_classes
            .values()
            .filter(|c| c.event_id == event_id)
            .cloned()
            .collect();
        classes.sort_by(|a, b| {
            a.price
                .cmp(&b.price)
                .then_with(|| a.ticket_type.cmp(&b.ticket_type))
        });
        Ok(classes)
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn reserve(&self, reservation: Reservation) -> StoreResult<Reservation> {
        if reservation.quantity <= 0 {
            return Err(StoreError::InvalidQuantity(format!(
                "Quantity must be positive, got {}",
                reservation.quantity
            )));
        }

        let mut state = self.write()?;
        let class = state
            .ticket_classes
            .get_mut(&reservation.ticket_class_id)
            .ok_or_else(|| StoreError::not_found("TicketClass", reservation.ticket_class_id))?;

        if class.remaining < reservation.quantity {
            return Err(StoreError::InsufficientInventory {
                ticket_class_id: class.id,
                requested: reservation.quantity,
                remaining: class.remaining,
            });
        }
        class.remaining -= reservation.quantity;

        state
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn get_reservation(&self, token: ReservationToken) -> StoreResult<Reservation> {
        self.read()?
            .reservations
            .get(&token.id())
            .cloned()
            .ok_or_else(|| StoreError::not_found("Reservation", token))
    }

    async fn release(
        &self,
        token: ReservationToken,
        at: DateTime<Utc>,
    ) -> StoreResult<Transition> {
        let mut state = self.write()?;
        if let Some(reservation) = state.resolve(token.id(), ReservationState::Released, at) {
            return Ok(Transition {
                reservation,
                applied: true,
            });
        }
        let reservation = state
            .reservations
            .get(&token.id())
            .cloned()
            .ok_or_else(|| StoreError::not_found("Reservation", token))?;
        Ok(Transition {
            reservation,
            applied: false,
        })
    }

    async fn commit(
        &self,
        tokens: &[ReservationToken],
        at: DateTime<Utc>,
    ) -> StoreResult<CommitOutcome> {
        let mut state = self.write()?;
        if let Some((token, current)) = state.first_stale(tokens, at)? {
            return Ok(CommitOutcome::Stale {
                token,
                state: current,
            });
        }
        state.commit_all(tokens, at);
        Ok(CommitOutcome::Committed)
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        let mut state = self.write()?;
        let expired: Vec<Uuid> = state
            .reservations
            .values()
            .filter(|r| r.state == ReservationState::Pending && r.is_expired_at(now))
            .map(|r| r.id)
            .collect();

        let released = expired
            .into_iter()
            .filter_map(|id| state.resolve(id, ReservationState::Released, now))
            .collect();

        let horizon = now - chrono::Duration::hours(RESOLVED_RETENTION_HOURS);
        state
            .reservations
            .retain(|_, r| r.resolved_at.map_or(true, |resolved| resolved > horizon));
        Ok(released)
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn commit_and_record(
        &self,
        tokens: &[ReservationToken],
        payment: Payment,
        at: DateTime<Utc>,
    ) -> StoreResult<SettlementOutcome> {
        let mut state = self.write()?;
        if let Some(existing) = state
            .payments
            .iter()
            .find(|p| p.idempotency_key == payment.idempotency_key)
        {
            return Ok(SettlementOutcome::KeyTaken(existing.clone()));
        }
        if let Some((token, current)) = state.first_stale(tokens, at)? {
            return Ok(SettlementOutcome::Stale {
                token,
                state: current,
            });
        }

        state.commit_all(tokens, at);
        state.payments.push(payment.clone());
        Ok(SettlementOutcome::Recorded(payment))
    }

    async fn get_payment(&self, id: Uuid) -> StoreResult<Payment> {
        self.read()?
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Payment", id))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Payment>> {
        Ok(self
            .read()?
            .payments
            .iter()
            .find(|p| p.idempotency_key == key)
            .cloned())
    }

    async fn list_payments(&self) -> StoreResult<Vec<Payment>> {
        Ok(self.read()?.payments.iter().rev().cloned().collect())
    }

    async fn list_payments_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Payment>> {
        Ok(self
            .read()?
            .payments
            .iter()
            .rev()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn delete_payment(&self, id: Uuid) -> StoreResult<Payment> {
        let mut state = self.write()?;
        let index = state
            .payments
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found("Payment", id))?;
        Ok(state.payments.remove(index))
    }

    async fn overall_stats(&self) -> StoreResult<OverallStats> {
        Ok(reporting::summarize(&self.read()?.payments))
    }

    async fn monthly_stats(&self) -> StoreResult<Vec<MonthlyStats>> {
        Ok(reporting::bucket_by_month(&self.read()?.payments))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut state = self.write()?;
        let exists = state.users.contains_key(&user.id)
            || state
                .users
                .values()
                .any(|u| u.username == user.username || u.email == user.email);
        if exists {
            return Err(StoreError::Conflict("User already exists".to_string()));
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        self.read()?
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("User", id))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<User> {
        let mut state = self.write()?;
        let user = state
            .users
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("User", id))?;
        state.favorites.retain(|(user_id, _)| *user_id != id);
        Ok(user)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(self.read()?.users.len() as i64)
    }

    async fn add_favorite(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<()> {
        let mut state = self.write()?;
        if !state.events.contains_key(&event_id) {
            return Err(StoreError::not_found("Event", event_id));
        }
        state.favorites.insert((user_id, event_id));
        Ok(())
    }

    async fn remove_favorite(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<bool> {
        Ok(self.write()?.favorites.remove(&(user_id, event_id)))
    }

    async fn favorite_event_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(self
            .read()?
            .favorites
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, event_id)| *event_id)
            .collect())
    }
}
