//! Event stream naming configuration.

use serde::Deserialize;

/// Stream names and consumer identities.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamsConfig {
    #[serde(default = "default_inventory_stream")]
    pub inventory_stream: String,

    #[serde(default = "default_order_stream")]
    pub order_stream: String,

    #[serde(default = "default_ticket_stream")]
    pub ticket_stream: String,

    /// Consumer-group name for the ticket worker.
    #[serde(default = "default_ticket_group")]
    pub ticket_group: String,

    /// Consumer-group name for the query projector.
    #[serde(default = "default_query_group")]
    pub query_group: String,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            inventory_stream: default_inventory_stream(),
            order_stream: default_order_stream(),
            ticket_stream: default_ticket_stream(),
            ticket_group: default_ticket_group(),
            query_group: default_query_group(),
        }
    }
}

fn default_inventory_stream() -> String {
    "inventory.events".to_string()
}

fn default_order_stream() -> String {
    "order.events".to_string()
}

fn default_ticket_stream() -> String {
    "ticket.events".to_string()
}

fn default_ticket_group() -> String {
    "ticket-worker".to_string()
}

fn default_query_group() -> String {
    "query-service".to_string()
}
