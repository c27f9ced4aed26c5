//! Denormalized order view served by the query side.

mod order_view;

pub use order_view::OrderView;
