//! PassVault — an encrypted password vault engine.
//!
//! Vaults are named collections of credential records, each persisted as
//! one AES-256-GCM encrypted blob keyed by an Argon2id-derived master key.
//! `SessionEngine` unlocks vaults into memory and serves concurrent reads
//! and writes against them, saving the whole vault after every change.

pub mod config;
pub mod crypto;
pub mod errors;
pub mod session;
pub mod vault;

pub use errors::{PassVaultError, Result};
pub use session::SessionEngine;
pub use vault::{FileVaultStore, MemoryVaultStore, PasswordRecord, VaultStore};
