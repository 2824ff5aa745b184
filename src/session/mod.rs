//! Session module — unlocked vaults and the operations adapters call.
//!
//! `SessionEngine` is the whole public surface: create, unlock, lock and
//! list vaults, and read or mutate records in unlocked ones.

pub mod engine;
mod state;

pub use engine::SessionEngine;
