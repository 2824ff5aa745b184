//! In-memory `VaultStore` for tests and embedding.
//!
//! Stores the same serialized bytes a `FileVaultStore` would write, so
//! parsing and corruption handling behave identically.

use std::collections::HashMap;
use std::sync::RwLock;

use super::format::VaultMetadata;
use super::store::{validate_vault_name, VaultStore};
use crate::errors::{PassVaultError, Result};

/// Map-backed vault store.
#[derive(Debug, Default)]
pub struct MemoryVaultStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes under `name`, bypassing serialization.
    ///
    /// Lets tests plant damaged entries. `name` must still be a valid
    /// vault name.
    pub fn put_raw(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        validate_vault_name(name)?;
        self.write().insert(name.to_string(), bytes);
        Ok(())
    }

    /// Raw bytes currently stored under `name`.
    pub fn get_raw(&self, name: &str) -> Option<Vec<u8>> {
        self.read().get(name).cloned()
    }

    // A panic while holding the lock cannot leave the map half-updated:
    // every write is a single insert.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl VaultStore for MemoryVaultStore {
    fn exists(&self, name: &str) -> Result<bool> {
        validate_vault_name(name)?;
        Ok(self.read().contains_key(name))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn save(&self, name: &str, metadata: &VaultMetadata) -> Result<()> {
        validate_vault_name(name)?;
        let bytes = metadata.to_bytes()?;
        self.write().insert(name.to_string(), bytes);
        Ok(())
    }

    fn create(&self, name: &str, metadata: &VaultMetadata) -> Result<()> {
        validate_vault_name(name)?;
        let bytes = metadata.to_bytes()?;

        let mut blobs = self.write();
        if blobs.contains_key(name) {
            return Err(PassVaultError::VaultAlreadyExists(name.to_string()));
        }
        blobs.insert(name.to_string(), bytes);
        Ok(())
    }

    fn load(&self, name: &str) -> Result<VaultMetadata> {
        validate_vault_name(name)?;
        let bytes = self
            .get_raw(name)
            .ok_or_else(|| PassVaultError::VaultNotFound(name.to_string()))?;
        VaultMetadata::from_bytes(name, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::format::FORMAT_VERSION;

    fn meta(byte: u8) -> VaultMetadata {
        VaultMetadata {
            version: FORMAT_VERSION.to_string(),
            salt: vec![byte; 32],
            nonce: vec![byte; 12],
            ciphertext: vec![byte; 20],
            kdf: None,
        }
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let store = MemoryVaultStore::new();
        store.create("v", &meta(1)).unwrap();

        let err = store.create("v", &meta(2)).unwrap_err();
        assert!(matches!(err, PassVaultError::VaultAlreadyExists(_)));
        assert_eq!(store.load("v").unwrap(), meta(1));
    }

    #[test]
    fn save_overwrites_wholesale() {
        let store = MemoryVaultStore::new();
        store.save("v", &meta(1)).unwrap();
        store.save("v", &meta(2)).unwrap();
        assert_eq!(store.load("v").unwrap(), meta(2));
    }

    #[test]
    fn missing_and_damaged_are_distinct() {
        let store = MemoryVaultStore::new();
        assert!(matches!(
            store.load("nope"),
            Err(PassVaultError::VaultNotFound(_))
        ));

        store.put_raw("broken", b"{".to_vec()).unwrap();
        assert!(matches!(
            store.load("broken"),
            Err(PassVaultError::CorruptVault(_))
        ));
    }

    #[test]
    fn list_is_sorted() {
        let store = MemoryVaultStore::new();
        store.save("work", &meta(1)).unwrap();
        store.save("personal", &meta(1)).unwrap();
        assert_eq!(store.list().unwrap(), vec!["personal", "work"]);
        assert!(store.exists("work").unwrap());
        assert!(!store.exists("other").unwrap());
    }

    #[test]
    fn put_raw_rejects_names_load_would_refuse() {
        let store = MemoryVaultStore::new();
        assert!(matches!(
            store.put_raw("../escape", b"{}".to_vec()),
            Err(PassVaultError::InvalidInput(_))
        ));
        assert!(store.list().unwrap().is_empty());
    }
}
