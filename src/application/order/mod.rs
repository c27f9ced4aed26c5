//! Order lifecycle orchestration.

mod service;

pub use service::{
    CancelOrderRequest, OrderService, OrderServiceConfig, PaymentCallbackRequest,
    ReserveOrderRequest,
};
