//! Postgres backend.
//!
//! Inventory changes are conditional updates (`... WHERE remaining >= $2`,
//! `... WHERE state = 'pending'`) so the database serializes competing
//! callers per row. A reservation transition and its inventory restore
//! share one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, Transaction as PgTransaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    stale_state, CatalogStore, InventoryStore, PaymentStore, StoreError, StoreResult, UserStore,
};
use crate::models::{
    CommitOutcome, Event, EventFilter, EventUpdate, MonthlyStats, OverallStats, Payment,
    Reservation, ReservationState, ReservationToken, SettledLine, SettlementOutcome, TicketClass,
    TicketClassUpdate, Transition, User,
};

const DUPLICATE_TICKET_TYPE: &str = "A ticket for this event type already exists";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    async fn restore(
        tx: &mut PgTransaction<'_, Postgres>,
        ticket_class_id: Uuid,
        quantity: i32,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE ticket_classes \
             SET remaining = LEAST(capacity, remaining + $2), updated_at = now() \
             WHERE id = $1",
        )
        .bind(ticket_class_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Locks the reservations behind `tokens` and returns the first one that
    /// can no longer be committed at `at`.
    async fn lock_for_commit(
        tx: &mut PgTransaction<'_, Postgres>,
        tokens: &[ReservationToken],
        at: DateTime<Utc>,
    ) -> StoreResult<Option<(ReservationToken, ReservationState)>> {
        let ids: Vec<Uuid> = tokens.iter().map(ReservationToken::id).collect();
        let rows = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await?;
        let by_id: HashMap<Uuid, Reservation> = rows.into_iter().map(|r| (r.id, r)).collect();

        for token in tokens {
            let reservation = by_id
                .get(&token.id())
                .ok_or_else(|| StoreError::not_found("Reservation", token))?;
            if let Some(current) = stale_state(reservation, at) {
                return Ok(Some((*token, current)));
            }
        }
        Ok(None)
    }

    async fn mark_committed(
        tx: &mut PgTransaction<'_, Postgres>,
        tokens: &[ReservationToken],
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let ids: Vec<Uuid> = tokens.iter().map(ReservationToken::id).collect();
        sqlx::query(
            "UPDATE reservations SET state = 'committed', resolved_at = $2 \
             WHERE id = ANY($1) AND state = 'pending'",
        )
        .bind(&ids)
        .bind(at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn write_payment(
        tx: &mut PgTransaction<'_, Postgres>,
        payment: &Payment,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO payments \
             (id, idempotency_key, buyer_id, buyer_name, event_id, event_topic, ticket_count, \
              total_amount, settled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(payment.id)
        .bind(&payment.idempotency_key)
        .bind(payment.buyer_id)
        .bind(&payment.buyer_name)
        .bind(payment.event_id)
        .bind(&payment.event_topic)
        .bind(payment.ticket_count)
        .bind(payment.total_amount)
        .bind(payment.settled_at)
        .execute(&mut **tx)
        .await?;

        for (line_no, line) in payment.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO payment_lines \
                 (payment_id, line_no, ticket_class_id, ticket_type, quantity, unit_price, subtotal) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(payment.id)
            .bind(line_no as i32)
            .bind(line.ticket_class_id)
            .bind(&line.ticket_type)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.subtotal)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn attach_lines(&self, mut payments: Vec<Payment>) -> StoreResult<Vec<Payment>> {
        if payments.is_empty() {
            return Ok(payments);
        }

        let ids: Vec<Uuid> = payments.iter().map(|p| p.id).collect();
        let rows = sqlx::query_as::<_, LineRow>(
            "SELECT payment_id, ticket_class_id, ticket_type, quantity, unit_price, subtotal \
             FROM payment_lines WHERE payment_id = ANY($1) ORDER BY payment_id, line_no",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_payment: HashMap<Uuid, Vec<SettledLine>> = HashMap::new();
        for row in rows {
            by_payment
                .entry(row.payment_id)
                .or_default()
                .push(row.into_line());
        }
        for payment in &mut payments {
            payment.lines = by_payment.remove(&payment.id).unwrap_or_default();
        }
        Ok(payments)
    }
}

#[derive(FromRow)]
struct LineRow {
    payment_id: Uuid,
    ticket_class_id: Uuid,
    ticket_type: String,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl LineRow {
    fn into_line(self) -> SettledLine {
        SettledLine {
            ticket_class_id: self.ticket_class_id,
            ticket_type: self.ticket_type,
            quantity: self.quantity,
            unit_price: self.unit_price,
            subtotal: self.subtotal,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

fn unique_or(err: sqlx::Error, message: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict(message.to_string())
    } else {
        StoreError::Database(err)
    }
}

fn missing_parent_or(err: sqlx::Error, entity: &'static str, id: Uuid) -> StoreError {
    if is_foreign_key_violation(&err) {
        StoreError::not_found(entity, id)
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_event(&self, event: Event) -> StoreResult<Event> {
        let event = sqlx::query_as::<_, Event>(
            "INSERT INTO events \
             (id, topic, description, venue, time, date, category, image, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(event.id)
        .bind(&event.topic)
        .bind(&event.description)
        .bind(&event.venue)
        .bind(&event.time)
        .bind(event.date)
        .bind(&event.category)
        .bind(&event.image)
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(event)
    }

    async fn update_event(&self, id: Uuid, update: EventUpdate) -> StoreResult<Event> {
        let mut tx = self.pool.begin().await?;
        let mut event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found("Event", id))?;
        update.apply(&mut event);

        let event = sqlx::query_as::<_, Event>(
            "UPDATE events SET topic = $2, description = $3, venue = $4, time = $5, date = $6, \
             category = $7, image = $8, updated_at = $9 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&event.topic)
        .bind(&event.description)
        .bind(&event.venue)
        .bind(&event.time)
        .bind(event.date)
        .bind(&event.category)
        .bind(&event.image)
        .bind(event.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<Event> {
        // ticket_classes and favorites cascade
        sqlx::query_as::<_, Event>("DELETE FROM events WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("Event", id))
    }

    async fn get_event(&self, id: Uuid) -> StoreResult<Event> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("Event", id))
    }

    async fn list_events(&self, filter: &EventFilter) -> StoreResult<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events \
             WHERE ($1::TEXT IS NULL OR lower(category) = lower($1)) \
               AND ($2::TEXT IS NULL \
                    OR strpos(lower(topic), lower($2)) > 0 \
                    OR strpos(lower(venue), lower($2)) > 0 \
                    OR strpos(lower(description), lower($2)) > 0) \
               AND ($3::DATE IS NULL OR date >= $3) \
               AND ($4::DATE IS NULL OR date <= $4) \
             ORDER BY date, topic",
        )
        .bind(&filter.category)
        .bind(&filter.search)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn count_events(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn insert_ticket_class(&self, class: TicketClass) -> StoreResult<TicketClass> {
        let event_id = class.event_id;
        sqlx::query_as::<_, TicketClass>(
            "INSERT INTO ticket_classes \
             (id, event_id, ticket_type, description, price, capacity, remaining, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(class.id)
        .bind(class.event_id)
        .bind(&class.ticket_type)
        .bind(&class.description)
        .bind(class.price)
        .bind(class.capacity)
        .bind(class.remaining)
        .bind(class.created_at)
        .bind(class.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                StoreError::not_found("Event", event_id)
            } else {
                unique_or(err, DUPLICATE_TICKET_TYPE)
            }
        })
    }

    async fn update_ticket_class(
        &self,
        id: Uuid,
        update: TicketClassUpdate,
    ) -> StoreResult<TicketClass> {
        let mut tx = self.pool.begin().await?;
        // The row lock holds off concurrent reserves while the capacity delta is applied.
        let current = sqlx::query_as::<_, TicketClass>(
            "SELECT * FROM ticket_classes WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found("TicketClass", id))?;

        let next = update.apply(&current).ok_or_else(|| {
            StoreError::InvalidQuantity(format!(
                "Capacity cannot drop below the {} ticket(s) already sold or held",
                current.sold_or_held()
            ))
        })?;

        let updated = sqlx::query_as::<_, TicketClass>(
            "UPDATE ticket_classes SET ticket_type = $2, description = $3, price = $4, \
             capacity = $5, remaining = $6, updated_at = $7 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&next.ticket_type)
        .bind(&next.description)
        .bind(next.price)
        .bind(next.capacity)
        .bind(next.remaining)
        .bind(next.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| unique_or(err, DUPLICATE_TICKET_TYPE))?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_ticket_class(&self, id: Uuid) -> StoreResult<TicketClass> {
        sqlx::query_as::<_, TicketClass>("DELETE FROM ticket_classes WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("TicketClass", id))
    }

    async fn get_ticket_class(&self, id: Uuid) -> StoreResult<TicketClass> {
        sqlx::query_as::<_, TicketClass>("SELECT * FROM ticket_classes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("TicketClass", id))
    }

    async fn list_ticket_classes(&self, event_id: Uuid) -> StoreResult<Vec<TicketClass>> {
        self.get_event(event_id).await?;
        Ok(sqlx::query_as::<_, TicketClass>(
            "SELECT * FROM ticket_classes WHERE event_id = $1 ORDER BY price, ticket_type",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn reserve(&self, reservation: Reservation) -> StoreResult<Reservation> {
        if reservation.quantity <= 0 {
            return Err(StoreError::InvalidQuantity(format!(
                "Quantity must be positive, got {}",
                reservation.quantity
            )));
        }

        let mut tx = self.pool.begin().await?;
        let decremented = sqlx::query_scalar::<_, i32>(
            "UPDATE ticket_classes SET remaining = remaining - $2, updated_at = now() \
             WHERE id = $1 AND remaining >= $2 RETURNING remaining",
        )
        .bind(reservation.ticket_class_id)
        .bind(reservation.quantity)
        .fetch_optional(&mut *tx)
        .await?;

        if decremented.is_none() {
            let remaining =
                sqlx::query_scalar::<_, i32>("SELECT remaining FROM ticket_classes WHERE id = $1")
                    .bind(reservation.ticket_class_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match remaining {
                Some(remaining) => StoreError::InsufficientInventory {
                    ticket_class_id: reservation.ticket_class_id,
                    requested: reservation.quantity,
                    remaining,
                },
                None => StoreError::not_found("TicketClass", reservation.ticket_class_id),
            });
        }

        let reservation = sqlx::query_as::<_, Reservation>(
            "INSERT INTO reservations \
             (id, ticket_class_id, quantity, state, created_at, expires_at, resolved_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(reservation.id)
        .bind(reservation.ticket_class_id)
        .bind(reservation.quantity)
        .bind(reservation.state)
        .bind(reservation.created_at)
        .bind(reservation.expires_at)
        .bind(reservation.resolved_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reservation)
    }

    async fn get_reservation(&self, token: ReservationToken) -> StoreResult<Reservation> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
            .bind(token.id())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("Reservation", token))
    }

    async fn release(
        &self,
        token: ReservationToken,
        at: DateTime<Utc>,
    ) -> StoreResult<Transition> {
        let mut tx = self.pool.begin().await?;
        let released = sqlx::query_as::<_, Reservation>(
            "UPDATE reservations SET state = 'released', resolved_at = $2 \
             WHERE id = $1 AND state = 'pending' RETURNING *",
        )
        .bind(token.id())
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let transition = match released {
            Some(reservation) => {
                Self::restore(&mut tx, reservation.ticket_class_id, reservation.quantity).await?;
                Transition {
                    reservation,
                    applied: true,
                }
            }
            None => {
                let reservation =
                    sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
                        .bind(token.id())
                        .fetch_optional(&mut *tx)
                        .await?
                        .ok_or_else(|| StoreError::not_found("Reservation", token))?;
                Transition {
                    reservation,
                    applied: false,
                }
            }
        };

        tx.commit().await?;
        Ok(transition)
    }

    async fn commit(
        &self,
        tokens: &[ReservationToken],
        at: DateTime<Utc>,
    ) -> StoreResult<CommitOutcome> {
        let mut tx = self.pool.begin().await?;
        if let Some((token, state)) = Self::lock_for_commit(&mut tx, tokens, at).await? {
            return Ok(CommitOutcome::Stale { token, state });
        }
        Self::mark_committed(&mut tx, tokens, at).await?;

        tx.commit().await?;
        Ok(CommitOutcome::Committed)
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        let mut tx = self.pool.begin().await?;
        let mut released = sqlx::query_as::<_, Reservation>(
            "UPDATE reservations SET state = 'released', resolved_at = $1 \
             WHERE state = 'pending' AND expires_at <= $1 RETURNING *",
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        // Fixed order keeps concurrent sweeps from deadlocking on ticket rows.
        released.sort_by_key(|r| r.ticket_class_id);
        for reservation in &released {
            Self::restore(&mut tx, reservation.ticket_class_id, reservation.quantity).await?;
        }

        tx.commit().await?;
        Ok(released)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn commit_and_record(
        &self,
        tokens: &[ReservationToken],
        payment: Payment,
        at: DateTime<Utc>,
    ) -> StoreResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await?;
        if let Some((token, state)) = Self::lock_for_commit(&mut tx, tokens, at).await? {
            return Ok(SettlementOutcome::Stale { token, state });
        }
        Self::mark_committed(&mut tx, tokens, at).await?;

        match Self::write_payment(&mut tx, &payment).await {
            Ok(()) => {}
            Err(err) if is_unique_violation(&err) => {
                // Dropping the transaction rolls the commit back.
                drop(tx);
                let key = &payment.idempotency_key;
                return match self.find_by_idempotency_key(key).await? {
                    Some(existing) => Ok(SettlementOutcome::KeyTaken(existing)),
                    None => Err(StoreError::Conflict(format!(
                        "Idempotency key '{key}' already settled"
                    ))),
                };
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;
        Ok(SettlementOutcome::Recorded(payment))
    }

    async fn get_payment(&self, id: Uuid) -> StoreResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("Payment", id))?;
        let mut attached = self.attach_lines(vec![payment]).await?;
        attached
            .pop()
            .ok_or_else(|| StoreError::not_found("Payment", id))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Payment>> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE idempotency_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        match payment {
            Some(payment) => Ok(self.attach_lines(vec![payment]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_payments(&self) -> StoreResult<Vec<Payment>> {
        let payments =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments ORDER BY settled_at DESC")
                .fetch_all(&self.pool)
                .await?;
        self.attach_lines(payments).await
    }

    async fn list_payments_for_event(&self, event_id: Uuid) -> StoreResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE event_id = $1 ORDER BY settled_at DESC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        self.attach_lines(payments).await
    }

    async fn delete_payment(&self, id: Uuid) -> StoreResult<Payment> {
        let payment = self.get_payment(id).await?;
        let deleted = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::not_found("Payment", id));
        }
        Ok(payment)
    }

    async fn overall_stats(&self) -> StoreResult<OverallStats> {
        Ok(sqlx::query_as::<_, OverallStats>(
            "SELECT COALESCE(SUM(ticket_count), 0)::BIGINT AS total_tickets_sold, \
                    COALESCE(SUM(total_amount), 0) AS total_income, \
                    COUNT(*) AS total_transactions \
             FROM payments",
        )
        .fetch_one(&self.pool)
        .await?)
    }

    async fn monthly_stats(&self) -> StoreResult<Vec<MonthlyStats>> {
        Ok(sqlx::query_as::<_, MonthlyStats>(
            "SELECT EXTRACT(YEAR FROM settled_at AT TIME ZONE 'UTC')::INT AS year, \
                    EXTRACT(MONTH FROM settled_at AT TIME ZONE 'UTC')::INT AS month, \
                    SUM(ticket_count)::BIGINT AS total_tickets, \
                    SUM(total_amount) AS total_income, \
                    COUNT(*) AS count \
             FROM payments \
             GROUP BY 1, 2 \
             ORDER BY 1 DESC, 2 DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: User) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, email, created_at) VALUES ($1, $2, $3, $4) \
             RETURNING *",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| unique_or(err, "User already exists"))
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found("User", id))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;
        let user = sqlx::query_as::<_, User>("DELETE FROM users WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found("User", id))?;
        sqlx::query("DELETE FROM favorites WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn add_favorite(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO favorites (user_id, event_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|err| missing_parent_or(err, "Event", event_id))?;
        Ok(())
    }

    async fn remove_favorite(&self, user_id: Uuid, event_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND event_id = $2")
            .bind(user_id)
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn favorite_event_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(sqlx::query_scalar::<_, Uuid>(
            "SELECT event_id FROM favorites WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
