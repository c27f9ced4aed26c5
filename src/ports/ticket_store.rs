//! TicketStore port - ticket issuance as one atomic unit.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::ticket::Ticket;

use super::outbox::OutboxInsert;

/// Outcome of attempting to issue a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOutcome {
    /// Ticket inserted, order marked `TICKETED`, outbox row written.
    Issued,
    /// The order is not (or no longer) in `PAID`; nothing persisted.
    OrderNotPaid,
    /// A ticket already exists for this order; nothing persisted.
    AlreadyIssued,
}

/// Port for ticket persistence. `issue_ticket` runs one transaction:
/// verify the order is `PAID`, insert the ticket (unique per order), move
/// the order to `TICKETED`, and write the `TicketIssued` outbox row.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn issue_ticket(
        &self,
        ticket: &Ticket,
        event: &OutboxInsert,
    ) -> Result<TicketOutcome, DomainError>;
}
