//! Foundation types shared by every domain module.

mod errors;
mod events;
mod state_machine;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::EventEnvelope;
pub use state_machine::StateMachine;
