//! Per-vault unlocked state.

use crate::crypto::keys::VaultKey;
use crate::vault::record::Vault;

/// Decrypted vault plus the key it was unlocked with.
///
/// Lives behind an `RwLock` inside the engine's session map. Once
/// `close`d the key and secrets are wiped and every operation that still
/// holds the handle treats the vault as locked.
pub(crate) struct Session {
    pub(crate) vault: Vault,
    pub(crate) key: VaultKey,
    /// Salt the key was derived from; checked against storage before
    /// every save.
    pub(crate) salt: Vec<u8>,
    open: bool,
}

impl Session {
    pub(crate) fn new(vault: Vault, key: VaultKey, salt: Vec<u8>) -> Self {
        Self {
            vault,
            key,
            salt,
            open: true,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    /// Wipe key material and decrypted records.
    pub(crate) fn close(&mut self) {
        self.key.wipe();
        self.vault.wipe();
        self.open = false;
    }
}
