//! Order building: turns a cart of requested quantities into priced lines.
//!
//! Pure computation over a catalog snapshot. The availability check here is
//! advisory only, since advertised counts can be stale by the time a buyer
//! checks out; the inventory ledger makes the authoritative call.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Order, OrderLine, OrderRequestLine, TicketClass};

#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error("quantity {requested} for ticket class {ticket_class_id} is invalid")]
    NonPositiveQuantity { ticket_class_id: Uuid, requested: i32 },

    #[error("requested {requested} ticket(s) of class {ticket_class_id} but only {available} advertised")]
    ExceedsAdvertised {
        ticket_class_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("requested ticket quantity is too large")]
    QuantityOverflow,

    #[error("order contains no tickets")]
    Empty,

    #[error("ticket class {0} not found")]
    UnknownTicketClass(Uuid),

    #[error("all tickets in one order must belong to the same event")]
    MixedEvents,
}

/// Merges repeated ticket classes, drops zero quantities and rejects
/// negative ones. The result is sorted by ticket class id.
pub fn normalize(requested: &[OrderRequestLine]) -> Result<Vec<OrderRequestLine>, OrderError> {
    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();

    for line in requested {
        if line.quantity < 0 {
            return Err(OrderError::NonPositiveQuantity {
                ticket_class_id: line.ticket_class_id,
                requested: line.quantity,
            });
        }
        let quantity = merged.entry(line.ticket_class_id).or_insert(0);
        *quantity = quantity
            .checked_add(line.quantity)
            .ok_or(OrderError::QuantityOverflow)?;
    }

    let lines: Vec<OrderRequestLine> = merged
        .into_iter()
        .filter(|(_, quantity)| *quantity > 0)
        .map(|(ticket_class_id, quantity)| OrderRequestLine {
            ticket_class_id,
            quantity,
        })
        .collect();

    if lines.is_empty() {
        return Err(OrderError::Empty);
    }
    Ok(lines)
}

/// Prices normalized lines against `classes`. Totals always come from the
/// catalog prices passed in here, never from the client.
pub fn price(lines: &[OrderRequestLine], classes: &[TicketClass]) -> Result<Order, OrderError> {
    let by_id: HashMap<Uuid, &TicketClass> = classes.iter().map(|c| (c.id, c)).collect();

    let mut event_id = None;
    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let class = by_id
            .get(&line.ticket_class_id)
            .ok_or(OrderError::UnknownTicketClass(line.ticket_class_id))?;

        match event_id {
            None => event_id = Some(class.event_id),
            Some(id) if id != class.event_id => return Err(OrderError::MixedEvents),
            Some(_) => {}
        }

        priced.push(OrderLine {
            ticket_class_id: class.id,
            ticket_type: class.ticket_type.clone(),
            quantity: line.quantity,
            unit_price: class.price,
            subtotal: class.price * Decimal::from(line.quantity),
        });
    }

    let event_id = event_id.ok_or(OrderError::Empty)?;
    let ticket_count = priced
        .iter()
        .try_fold(0i32, |count, l| count.checked_add(l.quantity))
        .ok_or(OrderError::QuantityOverflow)?;
    let total = priced.iter().map(|l| l.subtotal).sum();

    Ok(Order {
        event_id,
        lines: priced,
        ticket_count,
        total,
    })
}

/// Full client-side build: normalize, check against advertised counts,
/// then price.
pub fn build_order(
    requested: &[OrderRequestLine],
    classes: &[TicketClass],
) -> Result<Order, OrderError> {
    let lines = normalize(requested)?;

    for line in &lines {
        let class = classes
            .iter()
            .find(|c| c.id == line.ticket_class_id)
            .ok_or(OrderError::UnknownTicketClass(line.ticket_class_id))?;
        if line.quantity > class.remaining {
            return Err(OrderError::ExceedsAdvertised {
                ticket_class_id: class.id,
                requested: line.quantity,
                available: class.remaining,
            });
        }
    }

    price(&lines, classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTicketClass;

    fn class(event_id: Uuid, ticket_type: &str, price: i64, remaining: i32) -> TicketClass {
        let mut class = NewTicketClass {
            ticket_type: ticket_type.to_string(),
            description: None,
            price: Decimal::new(price, 0),
            capacity: 10,
        }
        .into_ticket_class(event_id);
        class.remaining = remaining;
        class
    }

    fn line(class: &TicketClass, quantity: i32) -> OrderRequestLine {
        OrderRequestLine {
            ticket_class_id: class.id,
            quantity,
        }
    }

    #[test]
    fn test_build_order_drops_zero_lines_and_totals() {
        let event = Uuid::new_v4();
        let vip = class(event, "VIP", 500, 10);
        let general = class(event, "General", 120, 10);
        let balcony = class(event, "Balcony", 80, 10);
        let classes = vec![vip.clone(), general.clone(), balcony.clone()];

        let order = build_order(
            &[line(&vip, 2), line(&general, 3), line(&balcony, 0)],
            &classes,
        )
        .unwrap();

        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.ticket_count, 5);
        assert_eq!(order.total, Decimal::new(1360, 0));
        assert_eq!(order.event_id, event);
        for l in &order.lines {
            assert_eq!(l.subtotal, l.unit_price * Decimal::from(l.quantity));
        }
    }

    #[test]
    fn test_quantity_above_advertised_is_invalid() {
        let vip = class(Uuid::new_v4(), "VIP", 500, 3);
        let err = build_order(&[line(&vip, 4)], &[vip.clone()]).unwrap_err();
        assert_eq!(
            err,
            OrderError::ExceedsAdvertised {
                ticket_class_id: vip.id,
                requested: 4,
                available: 3
            }
        );
    }

    #[test]
    fn test_negative_quantity_is_invalid() {
        let vip = class(Uuid::new_v4(), "VIP", 500, 3);
        assert!(matches!(
            build_order(&[line(&vip, -1)], &[vip.clone()]),
            Err(OrderError::NonPositiveQuantity { requested: -1, .. })
        ));
    }

    #[test]
    fn test_all_zero_order_is_empty() {
        let vip = class(Uuid::new_v4(), "VIP", 500, 3);
        assert_eq!(
            build_order(&[line(&vip, 0)], &[vip.clone()]).unwrap_err(),
            OrderError::Empty
        );
    }

    #[test]
    fn test_repeated_lines_are_merged() {
        let vip = class(Uuid::new_v4(), "VIP", 50, 10);
        let lines = normalize(&[line(&vip, 1), line(&vip, 2)]).unwrap();
        assert_eq!(lines, vec![line(&vip, 3)]);
    }

    #[test]
    fn test_lines_from_two_events_rejected() {
        let a = class(Uuid::new_v4(), "VIP", 50, 10);
        let b = class(Uuid::new_v4(), "VIP", 50, 10);
        let lines = normalize(&[line(&a, 1), line(&b, 1)]).unwrap();
        assert_eq!(price(&lines, &[a, b]).unwrap_err(), OrderError::MixedEvents);
    }

    #[test]
    fn test_merged_quantity_overflow_is_rejected() {
        let vip = class(Uuid::new_v4(), "VIP", 50, 10);
        assert_eq!(
            normalize(&[line(&vip, i32::MAX), line(&vip, 1)]).unwrap_err(),
            OrderError::QuantityOverflow
        );

        let event = Uuid::new_v4();
        let general = class(event, "General", 10, 10);
        let balcony = class(event, "Balcony", 10, 10);
        let lines = normalize(&[line(&general, i32::MAX), line(&balcony, 1)]).unwrap();
        assert_eq!(
            price(&lines, &[general, balcony]).unwrap_err(),
            OrderError::QuantityOverflow
        );
    }
}
