//! CQRS read side: projector loops and cached view queries.

mod service;

pub use service::{QueryService, COLD_START_REBUILD_LIMIT, QUERY_CONSUMER};
