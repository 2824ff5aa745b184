//! On-disk vault metadata and its JSON encoding.
//!
//! A `.vault` file is a single JSON object:
//!
//! ```text
//! {"version":"1.0","salt":"<b64>","nonce":"<b64>","ciphertext":"<b64>","kdf":{...}}
//! ```
//!
//! - **version**: format tag, currently `"1.0"`.
//! - **salt**: 32 random bytes fixed at creation, never regenerated.
//! - **nonce**: 12 random bytes, regenerated on every save.
//! - **ciphertext**: AES-256-GCM encryption of the JSON `Vault` payload.
//! - **kdf**: Argon2id parameters used at creation.  Optional; when
//!   missing, the documented defaults apply.

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::Argon2Params;
use crate::errors::{PassVaultError, Result};

/// Current format tag written into every vault.
pub const FORMAT_VERSION: &str = "1.0";

/// Unencrypted envelope persisted for each vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMetadata {
    /// Format tag.
    pub version: String,

    /// Salt for Argon2id key derivation (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// Nonce of the most recent encryption (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub nonce: Vec<u8>,

    /// Encrypted vault payload including the GCM tag (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,

    /// Argon2 params used at vault creation (stored so unlock uses the same).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf: Option<Argon2Params>,
}

impl VaultMetadata {
    /// Argon2 parameters to derive this vault's key with.
    pub fn kdf_params(&self) -> Argon2Params {
        self.kdf.unwrap_or_default()
    }

    /// Serialize to the JSON bytes written to storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| PassVaultError::Serialization(format!("vault metadata: {e}")))
    }

    /// Parse stored bytes.
    ///
    /// Anything that does not parse into the expected structure, or carries
    /// an unknown format tag, is `CorruptVault`; `name` only labels the error.
    pub fn from_bytes(name: &str, data: &[u8]) -> Result<Self> {
        let metadata: VaultMetadata = serde_json::from_slice(data)
            .map_err(|e| PassVaultError::CorruptVault(format!("{name}: {e}")))?;

        if metadata.version != FORMAT_VERSION {
            return Err(PassVaultError::CorruptVault(format!(
                "{name}: unsupported version {}, expected {FORMAT_VERSION}",
                metadata.version
            )));
        }
        if metadata.salt.is_empty() {
            return Err(PassVaultError::CorruptVault(format!("{name}: empty salt")));
        }

        Ok(metadata)
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let encoded = BASE64.encode(data);
    serializer.serialize_str(&encoded)
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VaultMetadata {
        VaultMetadata {
            version: FORMAT_VERSION.to_string(),
            salt: vec![0u8, 1, 2, 255],
            nonce: vec![9u8; 12],
            ciphertext: vec![0xFFu8, 0x00, 0x7F],
            kdf: None,
        }
    }

    #[test]
    fn binary_fields_are_base64_strings() {
        let json: serde_json::Value = serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["salt"], "AAEC/w==");
        assert!(json.get("kdf").is_none());

        let parsed = VaultMetadata::from_bytes("v", &sample().to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn missing_kdf_falls_back_to_defaults() {
        assert_eq!(sample().kdf_params(), Argon2Params::default());
    }

    #[test]
    fn garbage_is_corrupt() {
        let err = VaultMetadata::from_bytes("v", b"not json at all").unwrap_err();
        assert!(matches!(err, PassVaultError::CorruptVault(_)));

        let err = VaultMetadata::from_bytes("v", b"").unwrap_err();
        assert!(matches!(err, PassVaultError::CorruptVault(_)));
    }

    #[test]
    fn bad_base64_is_corrupt() {
        let data = br#"{"version":"1.0","salt":"!!!","nonce":"","ciphertext":""}"#;
        let err = VaultMetadata::from_bytes("v", data).unwrap_err();
        assert!(matches!(err, PassVaultError::CorruptVault(_)));
    }

    #[test]
    fn unknown_version_is_corrupt() {
        let mut meta = sample();
        meta.version = "9.9".into();
        let err = VaultMetadata::from_bytes("v", &meta.to_bytes().unwrap()).unwrap_err();
        assert!(matches!(err, PassVaultError::CorruptVault(_)));
    }
}
