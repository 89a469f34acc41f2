use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A purchasable category of ticket for one event.
///
/// `remaining` is owned by the inventory ledger: it is only ever changed
/// through a conditional reserve/restore, never assigned directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TicketClass {
    pub id: Uuid,
    pub event_id: Uuid,
    pub ticket_type: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub capacity: i32,
    pub remaining: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketClass {
    pub fn sold_or_held(&self) -> i32 {
        self.capacity - self.remaining
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicketClass {
    pub ticket_type: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub capacity: i32,
}

impl NewTicketClass {
    pub fn validate(&self) -> Result<(), String> {
        if self.ticket_type.trim().is_empty() {
            return Err("Ticket type is required".to_string());
        }
        if self.price.is_sign_negative() {
            return Err("Price must be a positive number".to_string());
        }
        if self.capacity < 0 {
            return Err("Count must be a non-negative number".to_string());
        }
        Ok(())
    }

    pub fn into_ticket_class(self, event_id: Uuid) -> TicketClass {
        let now = Utc::now();
        TicketClass {
            id: Uuid::new_v4(),
            event_id,
            ticket_type: self.ticket_type.trim().to_string(),
            description: self.description,
            price: self.price,
            capacity: self.capacity,
            remaining: self.capacity,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Seller edit of a ticket class. A capacity change shifts `remaining` by
/// the same delta so that tickets already sold or held stay accounted for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketClassUpdate {
    pub ticket_type: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub capacity: Option<i32>,
}

impl TicketClassUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if self
            .ticket_type
            .as_deref()
            .is_some_and(|t| t.trim().is_empty())
        {
            return Err("Ticket type cannot be empty".to_string());
        }
        if self.price.is_some_and(|p| p.is_sign_negative()) {
            return Err("Price must be a positive number".to_string());
        }
        if self.capacity.is_some_and(|c| c < 0) {
            return Err("Count must be a non-negative number".to_string());
        }
        Ok(())
    }

    /// Applies the edit, returning `None` when the new capacity would leave
    /// fewer seats than are already sold or held.
    pub fn apply(self, class: &TicketClass) -> Option<TicketClass> {
        let mut next = class.clone();

        if let Some(capacity) = self.capacity {
            let remaining = class.remaining + (capacity - class.capacity);
            if remaining < 0 {
                return None;
            }
            next.capacity = capacity;
            next.remaining = remaining;
        }
        if let Some(ticket_type) = self.ticket_type {
            next.ticket_type = ticket_type.trim().to_string();
        }
        if let Some(description) = self.description {
            next.description = Some(description);
        }
        if let Some(price) = self.price {
            next.price = price;
        }
        next.updated_at = Utc::now();

        Some(next)
    }
}
