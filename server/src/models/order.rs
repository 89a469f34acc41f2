use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A requested quantity of one ticket class, as submitted by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequestLine {
    pub ticket_class_id: Uuid,
    pub quantity: i32,
}

/// A priced line. `subtotal` is always `unit_price * quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub ticket_class_id: Uuid,
    pub ticket_type: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub event_id: Uuid,
    pub lines: Vec<OrderLine>,
    pub ticket_count: i32,
    pub total: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub lines: Vec<OrderRequestLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub buyer_name: String,
    pub lines: Vec<OrderRequestLine>,
    /// Display total computed by the client. Never used for charging.
    #[serde(default)]
    pub expected_total: Option<Decimal>,
}
