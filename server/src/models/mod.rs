pub mod event;
pub mod order;
pub mod payment;
pub mod reservation;
pub mod ticket;
pub mod user;

pub use event::{Event, EventFilter, EventUpdate, EventView, NewEvent};
pub use order::{CheckoutRequest, Order, OrderLine, OrderRequestLine, QuoteRequest};
pub use payment::{MonthlyStats, OverallStats, Payment, SettledLine, SettlementOutcome};
pub use reservation::{
    CommitOutcome, Reservation, ReservationState, ReservationToken, ReserveRequest, Transition,
};
pub use ticket::{NewTicketClass, TicketClass, TicketClassUpdate};
pub use user::{NewUser, User};
