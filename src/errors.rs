use thiserror::Error;

/// All errors that can occur in PassVault.
///
/// Messages only ever name vaults and records. Passphrases, derived keys
/// and record secrets never appear in an error.
#[derive(Debug, Error)]
pub enum PassVaultError {
    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Vault errors ---
    /// The vault does not exist on disk, or is not currently unlocked.
    #[error("Vault '{0}' not found")]
    VaultNotFound(String),

    #[error("Vault '{0}' already exists")]
    VaultAlreadyExists(String),

    #[error("Invalid master password")]
    InvalidMasterPassword,

    #[error("Vault is corrupt: {0}")]
    CorruptVault(String),

    // --- Record errors ---
    #[error("Record '{0}' not found")]
    RecordNotFound(String),

    #[error("Record '{0}' already exists")]
    RecordAlreadyExists(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PassVaultError {
    /// `true` for the "missing vault" and "missing record" kinds.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::VaultNotFound(_) | Self::RecordNotFound(_))
    }
}

/// Convenience type alias for PassVault results.
pub type Result<T> = std::result::Result<T, PassVaultError>;
