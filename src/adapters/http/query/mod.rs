//! Query HTTP surface.

mod dto;
mod handlers;
mod routes;

pub use routes::query_routes;
