//! HTTP middleware.

mod request_context;

pub use request_context::{
    request_context, RequestContext, REQUEST_ID_HEADER, TRACE_ID_HEADER,
};
