//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` draws a fresh random 12-byte nonce from the OS
//! RNG and hands it back alongside the ciphertext; callers never supply
//! a nonce, so one cannot be reused by accident.  `decrypt` fails closed:
//! on any tag mismatch it returns `DecryptionFailed` and no plaintext.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use super::keys::KEY_LEN;
use crate::errors::{PassVaultError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LEN {
        return Err(PassVaultError::InvalidKey(format!(
            "expected {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key)
        .map_err(|e| PassVaultError::InvalidKey(format!("invalid key length: {e}")))
}

/// Encrypt `plaintext` under a 32-byte `key`.
///
/// Returns `(nonce, ciphertext)`; the ciphertext carries the 16-byte tag.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
    let cipher = cipher_for(key)?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| PassVaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);
    Ok((nonce_bytes, ciphertext))
}

/// Decrypt a ciphertext produced by `encrypt`.
pub fn decrypt(nonce: &[u8], ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    if nonce.len() != NONCE_LEN || ciphertext.len() < TAG_LEN {
        return Err(PassVaultError::DecryptionFailed);
    }
    let nonce = Nonce::from_slice(nonce);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| PassVaultError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ciphertext_is_plaintext_plus_tag() {
        let key = [0x11u8; KEY_LEN];
        let (_, ct) = encrypt(b"hello", &key).unwrap();
        assert_eq!(ct.len(), 5 + TAG_LEN);
    }

    #[test]
    fn short_nonce_fails_closed() {
        let key = [0x11u8; KEY_LEN];
        let (nonce, ct) = encrypt(b"hello", &key).unwrap();
        let err = decrypt(&nonce[..8], &ct, &key).unwrap_err();
        assert!(matches!(err, PassVaultError::DecryptionFailed));
    }

    #[test]
    fn wrong_key_length_is_invalid_key() {
        let err = encrypt(b"hello", &[0u8; 16]).unwrap_err();
        assert!(matches!(err, PassVaultError::InvalidKey(_)));

        let err = decrypt(&[0u8; NONCE_LEN], &[0u8; 32], &[0u8; 31]).unwrap_err();
        assert!(matches!(err, PassVaultError::InvalidKey(_)));
    }
}
