//! Core domain: entities, game rules, and the ports the adapters plug
//! into. Nothing in this module touches a database or cache driver.

pub mod cache_layer;
pub mod engine;
pub mod error;
pub mod grant;
pub mod ids;
pub mod ledger;
pub mod login_bonus;
pub mod lottery;
pub mod master;
pub mod master_cache;
pub mod model;
pub mod ports;
pub mod presents;
pub mod shard;

pub use engine::GameEngine;
pub use error::Error;
