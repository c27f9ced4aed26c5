//! Ticket issuance worker.

mod worker;

pub use worker::{TicketWorker, TICKET_EVENTS_STREAM};
