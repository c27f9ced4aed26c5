//! Redis adapters: hold TTL store, view cache and event streams.

mod hold_ttl_store;
mod streams;
mod view_cache;

pub use hold_ttl_store::RedisHoldTtlStore;
pub use streams::{RedisStreamConsumer, RedisStreamProducer};
pub use view_cache::{RedisViewCache, VIEW_CACHE_TTL};
