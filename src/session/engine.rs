//! The session engine: unlocked vaults, record CRUD and persistence.
//!
//! `SessionEngine` turns a passphrase into a decrypted, mutable vault and
//! keeps at most one session per vault name.  Every mutation re-encrypts
//! the whole vault under a fresh nonce and saves it before returning.
//!
//! Locking layout:
//!
//! ```text
//! sessions: RwLock<HashMap<name, Arc<RwLock<Session>>>>
//!           ^ held to look up, insert or remove a handle
//!                                  ^ per vault: shared for reads,
//!                                    exclusive for mutations, unlock
//!                                    replacement and lock
//! ```
//!
//! Locks are always taken session first, then map, and the map lock is
//! never held while waiting on a session lock, so work on one vault never
//! blocks another. A session leaves the map only while its write lock is
//! held and is closed before that lock is released: at most one open
//! session exists per name, and every save happens through it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::state::Session;
use crate::config::Settings;
use crate::crypto::encryption::{decrypt, encrypt};
use crate::crypto::kdf::{derive_key_with_params, generate_salt, Argon2Params};
use crate::crypto::keys::VaultKey;
use crate::errors::{PassVaultError, Result};
use crate::vault::format::{VaultMetadata, FORMAT_VERSION};
use crate::vault::record::{PasswordRecord, Vault};
use crate::vault::store::{FileVaultStore, VaultStore};

type SessionHandle = Arc<RwLock<Session>>;

/// Process-scoped registry of unlocked vaults over a `VaultStore`.
///
/// Starts empty. Dropping the engine locks every open session, wiping
/// keys and decrypted records.
pub struct SessionEngine<S: VaultStore> {
    store: S,
    kdf: Argon2Params,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionEngine<FileVaultStore> {
    /// Build an engine over the file store described by `settings`.
    ///
    /// Relative `vault_dir` values resolve against `config_dir`.
    pub fn from_settings(settings: &Settings, config_dir: &Path) -> Result<Self> {
        let store = FileVaultStore::open(&settings.vault_dir_path(config_dir))?;
        Self::with_params(store, settings.argon2_params())
    }
}

impl<S: VaultStore> SessionEngine<S> {
    /// Engine using the default Argon2id parameters for new vaults.
    pub fn new(store: S) -> Self {
        Self {
            store,
            kdf: Argon2Params::default(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Engine using explicit Argon2id parameters for new vaults.
    ///
    /// Existing vaults always unlock with the parameters they were
    /// created with.
    pub fn with_params(store: S, kdf: Argon2Params) -> Result<Self> {
        kdf.validate()?;
        Ok(Self {
            store,
            kdf,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Vault lifecycle
    // ------------------------------------------------------------------

    /// Create a new, empty vault protected by `passphrase`.
    ///
    /// The new vault is left locked.
    pub fn create_vault(&self, name: &str, passphrase: &str) -> Result<()> {
        // Cheap check first so a duplicate name does not pay for Argon2.
        if self.store.exists(name)? {
            return Err(PassVaultError::VaultAlreadyExists(name.to_string()));
        }

        let salt = generate_salt()?;
        let key = derive_key_with_params(passphrase.as_bytes(), &salt, &self.kdf)?;

        let vault = Vault::new(name);
        let plaintext = vault.to_plaintext()?;
        let (nonce, ciphertext) = encrypt(&plaintext, key.as_bytes())?;

        let metadata = VaultMetadata {
            version: FORMAT_VERSION.to_string(),
            salt: salt.to_vec(),
            nonce: nonce.to_vec(),
            ciphertext,
            kdf: Some(self.kdf),
        };

        // `create` re-checks atomically; a racing creator loses here.
        self.store.create(name, &metadata)?;

        info!(vault = %name, "vault created");
        Ok(())
    }

    /// Unlock `name` with `passphrase` and install it as the session for
    /// that name, replacing any existing session.
    ///
    /// A wrong passphrase is `InvalidMasterPassword` and leaves every
    /// session untouched.
    pub fn unlock_vault(&self, name: &str, passphrase: &str) -> Result<()> {
        let mut metadata = self.store.load(name)?;

        // Argon2 runs before any lock is taken.
        let mut key = derive_key_with_params(
            passphrase.as_bytes(),
            &metadata.salt,
            &metadata.kdf_params(),
        )?;
        let mut vault = open_payload(name, &metadata, &key)?;

        loop {
            let Some(current) = self.handle(name) else {
                let mut sessions = self.write_sessions();
                if sessions.contains_key(name) {
                    continue;
                }

                // No session is open, so nothing in this engine can save the
                // vault while the map is held: the stored bytes are final.
                let latest = self.store.load(name)?;
                if latest != metadata {
                    drop(sessions);
                    (metadata, key, vault) = reopen(name, passphrase, &metadata, key, latest)?;
                    continue;
                }

                let session = Session::new(vault, key, metadata.salt);
                sessions.insert(name.to_string(), Arc::new(RwLock::new(session)));
                break;
            };

            // Holding the current session exclusively stops every save to
            // this vault until the replacement is installed.
            let mut old = write_session(&current);
            if !old.is_open() {
                // Replaced or locked since the lookup.
                continue;
            }

            let latest = self.store.load(name)?;
            if latest != metadata {
                (metadata, key, vault) = reopen(name, passphrase, &metadata, key, latest)?;
            }

            let session = Session::new(vault, key, metadata.salt);
            let displaced = self
                .write_sessions()
                .insert(name.to_string(), Arc::new(RwLock::new(session)));
            old.close();
            drop(old);

            if let Some(displaced) = displaced {
                if !Arc::ptr_eq(&displaced, &current) {
                    write_session(&displaced).close();
                }
            }
            break;
        }

        info!(vault = %name, "vault unlocked");
        Ok(())
    }

    /// Discard the session for `name`, wiping its key and records.
    ///
    /// `VaultNotFound` if `name` is not unlocked.
    pub fn lock_vault(&self, name: &str) -> Result<()> {
        loop {
            let handle = self.session(name)?;

            // Waits for in-flight readers and writers on this vault to finish.
            let mut session = write_session(&handle);
            if !session.is_open() {
                continue;
            }

            self.remove_handle(name, &handle);
            session.close();
            break;
        }

        info!(vault = %name, "vault locked");
        Ok(())
    }

    /// Lock every open session. Used on shutdown.
    pub fn lock_all(&self) {
        let handles: Vec<(String, SessionHandle)> = self
            .read_sessions()
            .iter()
            .map(|(name, handle)| (name.clone(), Arc::clone(handle)))
            .collect();

        for (name, handle) in handles {
            let mut session = write_session(&handle);
            if !session.is_open() {
                continue;
            }
            self.remove_handle(&name, &handle);
            session.close();
            info!(vault = %name, "vault locked");
        }
    }

    /// Whether `name` currently has a session.
    pub fn is_unlocked(&self, name: &str) -> bool {
        self.read_sessions().contains_key(name)
    }

    /// Names of all currently unlocked vaults, sorted.
    pub fn unlocked_vaults(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_sessions().keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of all vaults in the store. No vault needs to be unlocked.
    pub fn list_vaults(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    // ------------------------------------------------------------------
    // Record reads
    // ------------------------------------------------------------------

    /// Copies of every record in an unlocked vault.
    pub fn list_records(&self, name: &str) -> Result<Vec<PasswordRecord>> {
        self.read(name, |vault| Ok(vault.records.clone()))
    }

    /// Copy of the record named exactly `record_name`.
    pub fn get_record(&self, name: &str, record_name: &str) -> Result<PasswordRecord> {
        self.read(name, |vault| {
            vault
                .get(record_name)
                .cloned()
                .ok_or_else(|| PassVaultError::RecordNotFound(record_name.to_string()))
        })
    }

    // ------------------------------------------------------------------
    // Record mutations
    // ------------------------------------------------------------------

    /// Add a record and persist the vault.
    ///
    /// `RecordAlreadyExists` if the name is taken (case-sensitive).
    pub fn add_record(
        &self,
        name: &str,
        record_name: &str,
        username: &str,
        secret: &str,
    ) -> Result<PasswordRecord> {
        let record = self.mutate(name, |vault| {
            let record = PasswordRecord::new(record_name, username, secret, Utc::now());
            vault.insert(record.clone())?;
            Ok(record)
        })?;

        debug!(vault = %name, record = %record_name, "record added");
        Ok(record)
    }

    /// Update a record's username and/or secret and persist the vault.
    ///
    /// `None` leaves a field unchanged; `updated_at` advances either way.
    pub fn update_record(
        &self,
        name: &str,
        record_name: &str,
        username: Option<&str>,
        secret: Option<&str>,
    ) -> Result<PasswordRecord> {
        let record = self.mutate(name, |vault| {
            let record = vault
                .get_mut(record_name)
                .ok_or_else(|| PassVaultError::RecordNotFound(record_name.to_string()))?;
            record.apply_update(username, secret);
            Ok(record.clone())
        })?;

        debug!(vault = %name, record = %record_name, "record updated");
        Ok(record)
    }

    /// Remove exactly the record named `record_name` and persist the vault.
    pub fn delete_record(&self, name: &str, record_name: &str) -> Result<()> {
        self.mutate(name, |vault| vault.remove(record_name).map(drop))?;

        debug!(vault = %name, record = %record_name, "record deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn read_sessions(&self) -> RwLockReadGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, name: &str) -> Option<SessionHandle> {
        self.read_sessions().get(name).cloned()
    }

    /// Drop `handle` from the registry if it is still the entry for `name`.
    ///
    /// Callers hold the session's write lock and close it right after, so
    /// a session missing from the map is never open.
    fn remove_handle(&self, name: &str, handle: &SessionHandle) {
        let mut sessions = self.write_sessions();
        if sessions
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            sessions.remove(name);
        }
    }

    fn session(&self, name: &str) -> Result<SessionHandle> {
        self.handle(name)
            .ok_or_else(|| PassVaultError::VaultNotFound(name.to_string()))
    }

    /// After finding `stale` closed: the handle to retry with, if the
    /// vault was re-unlocked meanwhile rather than locked.
    fn replacement(&self, name: &str, stale: &SessionHandle) -> Result<SessionHandle> {
        match self.handle(name) {
            Some(fresh) if !Arc::ptr_eq(&fresh, stale) => Ok(fresh),
            _ => Err(PassVaultError::VaultNotFound(name.to_string())),
        }
    }

    /// Run `f` against the vault under a shared lock.
    fn read<T>(&self, name: &str, mut f: impl FnMut(&Vault) -> Result<T>) -> Result<T> {
        let mut handle = self.session(name)?;
        loop {
            {
                let session = read_session(&handle);
                if session.is_open() {
                    return f(&session.vault);
                }
            }
            handle = self.replacement(name, &handle)?;
        }
    }

    /// Apply `f` to a draft copy of the vault under an exclusive lock,
    /// persist the draft, then make it the session's vault.
    ///
    /// If `f` or the save fails the session keeps its previous state, so
    /// memory never runs ahead of what is on disk.
    fn mutate<T>(&self, name: &str, mut f: impl FnMut(&mut Vault) -> Result<T>) -> Result<T> {
        let mut handle = self.session(name)?;
        loop {
            {
                let mut session = write_session(&handle);
                if session.is_open() {
                    let mut draft = session.vault.clone();
                    let out = f(&mut draft)?;

                    self.persist(name, &session, &draft)?;
                    session.vault = draft;

                    return Ok(out);
                }
            }
            handle = self.replacement(name, &handle)?;
        }
    }

    /// Re-encrypt `vault` under the session key with a fresh nonce and
    /// overwrite the stored metadata, keeping its salt.
    fn persist(&self, name: &str, session: &Session, vault: &Vault) -> Result<()> {
        let plaintext = vault.to_plaintext()?;
        let (nonce, ciphertext) = encrypt(&plaintext, session.key.as_bytes())?;

        // Reload so we write on top of whatever is current on disk.
        let mut metadata = self.store.load(name)?;
        if metadata.salt != session.salt {
            warn!(vault = %name, "stored salt changed since unlock; refusing to save");
            return Err(PassVaultError::CorruptVault(format!(
                "{name}: salt changed since the vault was unlocked"
            )));
        }

        metadata.nonce = nonce.to_vec();
        metadata.ciphertext = ciphertext;
        self.store.save(name, &metadata)?;

        debug!(vault = %name, records = vault.records.len(), "vault persisted");
        Ok(())
    }
}

impl<S: VaultStore> Drop for SessionEngine<S> {
    fn drop(&mut self) {
        self.lock_all();
    }
}

/// Decrypt and parse a vault payload.
///
/// An authentication failure here can only mean the key is wrong, so it
/// is reported as `InvalidMasterPassword`.
fn open_payload(name: &str, metadata: &VaultMetadata, key: &VaultKey) -> Result<Vault> {
    let plaintext = match decrypt(&metadata.nonce, &metadata.ciphertext, key.as_bytes()) {
        Ok(plaintext) => zeroize::Zeroizing::new(plaintext),
        Err(PassVaultError::DecryptionFailed) => {
            warn!(vault = %name, "unlock failed: invalid master password");
            return Err(PassVaultError::InvalidMasterPassword);
        }
        Err(e) => return Err(e),
    };

    let mut vault = Vault::from_plaintext(name, &plaintext)?;
    if vault.name != name {
        debug!(vault = %name, stored = %vault.name, "payload name differs from storage key");
        vault.name = name.to_string();
    }
    Ok(vault)
}

/// Open `latest`, reusing `key` when the salt and KDF parameters match
/// what it was derived from.
fn reopen(
    name: &str,
    passphrase: &str,
    stale: &VaultMetadata,
    key: VaultKey,
    latest: VaultMetadata,
) -> Result<(VaultMetadata, VaultKey, Vault)> {
    let key = if latest.salt == stale.salt && latest.kdf_params() == stale.kdf_params() {
        key
    } else {
        derive_key_with_params(passphrase.as_bytes(), &latest.salt, &latest.kdf_params())?
    };
    let vault = open_payload(name, &latest, &key)?;
    Ok((latest, key, vault))
}

fn read_session(handle: &SessionHandle) -> RwLockReadGuard<'_, Session> {
    handle.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_session(handle: &SessionHandle) -> RwLockWriteGuard<'_, Session> {
    handle.write().unwrap_or_else(PoisonError::into_inner)
}
