//! PostgreSQL persistence adapters: per-shard user stores and the
//! master-data store, both over pooled `diesel-async` connections.

pub mod diesel_master_store;
pub mod diesel_user_store;
pub(crate) mod models;
pub mod pool;
pub mod schema;

pub use diesel_master_store::DieselMasterStore;
pub use diesel_user_store::DieselUserStore;
pub use pool::{DbPool, PoolConfig};
