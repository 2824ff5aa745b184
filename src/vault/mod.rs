//! Vault module — persisted envelope and decrypted payload.
//!
//! This module provides:
//! - `VaultMetadata`, the on-disk envelope (`format`)
//! - `Vault` and `PasswordRecord`, the decrypted payload (`record`)
//! - The `VaultStore` trait with file and in-memory backends (`store`, `memory`)

pub mod format;
pub mod memory;
pub mod record;
pub mod store;

// Re-export the most commonly used items.
pub use format::{VaultMetadata, FORMAT_VERSION};
pub use memory::MemoryVaultStore;
pub use record::{PasswordRecord, Vault};
pub use store::{validate_vault_name, FileVaultStore, VaultStore, VAULT_EXTENSION};
