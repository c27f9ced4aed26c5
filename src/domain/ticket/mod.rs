//! Ticket issued for a paid order.

use serde::{Deserialize, Serialize};

/// One ticket per order (`order_id` is unique in storage). The allocator's
/// seat string is stored as the passenger-facing name of the seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub order_id: String,
    pub passenger_name: String,
}
