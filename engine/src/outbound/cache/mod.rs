//! Cache adapters for the per-user cache port.

pub mod redis_user_cache;

pub use redis_user_cache::RedisUserCache;
