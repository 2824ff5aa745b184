//! The decrypted vault payload and the records it holds.
//!
//! A `Vault` only exists in memory while a session is unlocked; on disk
//! it is the plaintext of `VaultMetadata::ciphertext`, encoded as JSON.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{PassVaultError, Result};

/// A single credential stored in a vault.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRecord {
    /// Opaque identifier assigned at creation.
    pub id: String,

    /// Caller-chosen name, unique within the vault (case-sensitive).
    pub name: String,

    pub username: String,

    /// The protected value.
    pub secret: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl PasswordRecord {
    /// Build a record with a fresh id and both timestamps set to `now`.
    pub fn new(name: &str, username: &str, secret: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            username: username.to_string(),
            secret: secret.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. Absent fields are left alone; `updated_at`
    /// always moves strictly forward.
    pub fn apply_update(&mut self, username: Option<&str>, secret: Option<&str>) {
        if let Some(username) = username {
            self.username = username.to_string();
        }
        if let Some(secret) = secret {
            self.secret.zeroize();
            self.secret = secret.to_string();
        }
        self.updated_at = next_timestamp(self.updated_at);
    }
}

impl std::fmt::Debug for PasswordRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// The current time, nudged past `previous` when the clock has not
/// advanced (coarse clocks, or a clock that stepped backwards).
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::nanoseconds(1)
    }
}

/// A decrypted vault: its name plus an unordered set of records.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Vault {
    pub name: String,
    pub records: Vec<PasswordRecord>,
}

impl Vault {
    /// An empty vault called `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Vec::new(),
        }
    }

    /// Look up a record by exact name.
    pub fn get(&self, record_name: &str) -> Option<&PasswordRecord> {
        self.records.iter().find(|r| r.name == record_name)
    }

    pub fn get_mut(&mut self, record_name: &str) -> Option<&mut PasswordRecord> {
        self.records.iter_mut().find(|r| r.name == record_name)
    }

    pub fn contains(&self, record_name: &str) -> bool {
        self.get(record_name).is_some()
    }

    /// Append a record, refusing duplicates by exact name.
    pub fn insert(&mut self, record: PasswordRecord) -> Result<()> {
        if self.contains(&record.name) {
            return Err(PassVaultError::RecordAlreadyExists(record.name));
        }
        self.records.push(record);
        Ok(())
    }

    /// Remove exactly the record called `record_name`.
    pub fn remove(&mut self, record_name: &str) -> Result<PasswordRecord> {
        let idx = self
            .records
            .iter()
            .position(|r| r.name == record_name)
            .ok_or_else(|| PassVaultError::RecordNotFound(record_name.to_string()))?;
        Ok(self.records.remove(idx))
    }

    /// Overwrite every secret in place, then drop the records.
    pub fn wipe(&mut self) {
        for record in &mut self.records {
            record.secret.zeroize();
            record.username.zeroize();
        }
        self.records.clear();
    }

    /// Serialize to the plaintext that gets encrypted. The buffer is
    /// zeroed when dropped.
    pub fn to_plaintext(&self) -> Result<Zeroizing<Vec<u8>>> {
        serde_json::to_vec(self)
            .map(Zeroizing::new)
            .map_err(|e| PassVaultError::Serialization(format!("vault payload: {e}")))
    }

    /// Parse a decrypted payload. A payload that authenticated but does not
    /// parse means the vault is damaged.
    pub fn from_plaintext(name: &str, plaintext: &[u8]) -> Result<Self> {
        serde_json::from_slice(plaintext)
            .map_err(|e| PassVaultError::CorruptVault(format!("{name}: payload: {e}")))
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("name", &self.name)
            .field("records", &self.records)
            .finish()
    }
}
