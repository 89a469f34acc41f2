use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a hold: `Pending -> Committed` or `Pending -> Released`.
/// Both terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationState {
    Pending,
    Committed,
    Released,
}

impl ReservationState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReservationState::Pending)
    }
}

/// Opaque handle returned by a successful reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationToken(pub Uuid);

impl ReservationToken {
    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ReservationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for ReservationToken {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub ticket_class_id: Uuid,
    pub quantity: i32,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn pending(ticket_class_id: Uuid, quantity: i32, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ticket_class_id,
            quantity,
            state: ReservationState::Pending,
            created_at: now,
            expires_at: now + ttl,
            resolved_at: None,
        }
    }

    pub fn token(&self) -> ReservationToken {
        ReservationToken(self.id)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether a commit at `now` is still allowed.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.state == ReservationState::Pending && !self.is_expired_at(now)
    }
}

/// Result of a release: the reservation as it stands afterwards and whether
/// this call was the one that moved it out of `Pending`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub reservation: Reservation,
    pub applied: bool,
}

/// Result of committing one or more reservations together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Every token is now committed (some may already have been).
    Committed,
    /// Nothing changed: this token was released or its hold ran out.
    Stale {
        token: ReservationToken,
        state: ReservationState,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    pub ticket_class_id: Uuid,
    pub quantity: i32,
}
