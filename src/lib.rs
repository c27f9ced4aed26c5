//! Ticketd - ticketing platform reservation core.
//!
//! An in-memory, sharded, event-sourced inventory engine (WAL + snapshots +
//! TTL'd holds) together with the order state machine that drives it:
//! transactional outbox, ticket issuance worker, and a CQRS read model
//! projected from the event streams.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
