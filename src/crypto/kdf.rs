//! Passphrase-based key derivation using Argon2id.
//!
//! Argon2id is memory-hard, so every guess at a master passphrase costs
//! an attacker tens of megabytes and a noticeable slice of CPU time.
//! The default cost parameters are fixed and documented on
//! `Argon2Params::default`; vaults record the parameters they were
//! created with so later unlocks reproduce the same key.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};

use super::keys::{VaultKey, KEY_LEN};
use crate::errors::{PassVaultError, Result};

/// Length of the per-vault salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes over memory.
    pub iterations: u32,
    /// Parallelism lanes.
    pub parallelism: u32,
}

impl Default for Argon2Params {
    /// 64 MB of memory, 1 pass, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 1,
            parallelism: 4,
        }
    }
}

impl Argon2Params {
    /// Reject parameter sets that would make derivation dangerously cheap.
    pub fn validate(&self) -> Result<()> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(PassVaultError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if self.iterations < 1 {
            return Err(PassVaultError::KeyDerivationFailed(
                "Argon2 iterations must be at least 1".into(),
            ));
        }
        if self.parallelism < 1 {
            return Err(PassVaultError::KeyDerivationFailed(
                "Argon2 parallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Derive a 32-byte vault key from a passphrase and salt with the
/// default Argon2id parameters.
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> Result<VaultKey> {
    derive_key_with_params(passphrase, salt, &Argon2Params::default())
}

/// Derive a 32-byte vault key with explicit Argon2id parameters.
///
/// Deterministic: the same passphrase, salt and params always yield the
/// same key. Empty passphrases and salts are rejected.
pub fn derive_key_with_params(
    passphrase: &[u8],
    salt: &[u8],
    argon2_params: &Argon2Params,
) -> Result<VaultKey> {
    if passphrase.is_empty() {
        return Err(PassVaultError::InvalidInput(
            "passphrase cannot be empty".into(),
        ));
    }
    if salt.is_empty() {
        return Err(PassVaultError::InvalidInput("salt cannot be empty".into()));
    }
    argon2_params.validate()?;

    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| PassVaultError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    // Write straight into the zeroizing wrapper so no stray copy of the
    // key is left on the stack.
    let mut key = VaultKey::zeroed();
    argon2
        .hash_password_into(passphrase, salt, key.as_mut_bytes())
        .map_err(|e| {
            PassVaultError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}"))
        })?;

    Ok(key)
}

/// Generate a cryptographically random 32-byte salt from the OS RNG.
pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| PassVaultError::KeyDerivationFailed(format!("failed to generate salt: {e}")))?;
    Ok(salt)
}
