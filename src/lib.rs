//! AIHub gateway: user accounts, per-user session ownership, and a
//! normalizing proxy in front of the chat engine.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod routes;
pub mod state;
pub mod store;
