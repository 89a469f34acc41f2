use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::order::{Order, OrderLine, OrderRequestLine};
use super::reservation::{ReservationState, ReservationToken};

/// A settled sale. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub idempotency_key: String,
    pub buyer_id: Uuid,
    pub buyer_name: String,
    pub event_id: Uuid,
    pub event_topic: String,
    pub ticket_count: i32,
    pub total_amount: Decimal,
    pub settled_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub lines: Vec<SettledLine>,
}

/// Ticket type and price copied at the time of sale so later catalog edits
/// do not rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SettledLine {
    pub ticket_class_id: Uuid,
    pub ticket_type: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl From<OrderLine> for SettledLine {
    fn from(line: OrderLine) -> Self {
        Self {
            ticket_class_id: line.ticket_class_id,
            ticket_type: line.ticket_type,
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal,
        }
    }
}

impl Payment {
    pub fn settle(
        id: Uuid,
        idempotency_key: String,
        buyer_id: Uuid,
        buyer_name: String,
        event_topic: String,
        order: Order,
    ) -> Self {
        Self {
            id,
            idempotency_key,
            buyer_id,
            buyer_name,
            event_id: order.event_id,
            event_topic,
            ticket_count: order.ticket_count,
            total_amount: order.total,
            settled_at: Utc::now(),
            lines: order.lines.into_iter().map(SettledLine::from).collect(),
        }
    }

    /// Whether this payment settled exactly `lines` for `buyer_id`.
    /// `lines` must already be merged and sorted by ticket class id.
    pub fn matches_order(&self, buyer_id: Uuid, lines: &[OrderRequestLine]) -> bool {
        if self.buyer_id != buyer_id || self.lines.len() != lines.len() {
            return false;
        }

        let mut settled: Vec<(Uuid, i32)> = self
            .lines
            .iter()
            .map(|l| (l.ticket_class_id, l.quantity))
            .collect();
        settled.sort();

        settled
            .into_iter()
            .zip(lines)
            .all(|((id, qty), line)| id == line.ticket_class_id && qty == line.quantity)
    }
}

/// Result of committing a settlement's holds and writing its payment as
/// one step. Anything other than `Recorded` leaves the holds pending.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    Recorded(Payment),
    /// A hold was released or ran out before the commit.
    Stale {
        token: ReservationToken,
        state: ReservationState,
    },
    /// Another settlement already recorded a payment under this key.
    KeyTaken(Payment),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OverallStats {
    pub total_tickets_sold: i64,
    pub total_income: Decimal,
    pub total_transactions: i64,
}

impl Default for OverallStats {
    fn default() -> Self {
        Self {
            total_tickets_sold: 0,
            total_income: Decimal::ZERO,
            total_transactions: 0,
        }
    }
}

/// Totals for one calendar month (UTC) of settlement timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MonthlyStats {
    pub year: i32,
    pub month: i32,
    pub total_tickets: i64,
    pub total_income: Decimal,
    pub count: i64,
}
