//! Integration tests for the PassVault crypto module.

use passvault::crypto::{
    decrypt, derive_key, derive_key_with_params, encrypt, generate_salt, Argon2Params, KEY_LEN,
    NONCE_LEN, SALT_LEN,
};
use passvault::PassVaultError;

fn cheap_params() -> Argon2Params {
    Argon2Params {
        memory_kib: 8_192,
        iterations: 1,
        parallelism: 1,
    }
}

// ---------------------------------------------------------------------------
// Encryption round-trip
// ---------------------------------------------------------------------------

#[test]
fn encrypt_decrypt_roundtrip() {
    let key = [0xABu8; KEY_LEN];
    let plaintext = br#"{"name":"v","records":[]}"#;

    let (nonce, ciphertext) = encrypt(plaintext, &key).expect("encrypt should succeed");
    assert_eq!(nonce.len(), NONCE_LEN);
    assert_ne!(&ciphertext[..plaintext.len()], &plaintext[..]);

    let recovered = decrypt(&nonce, &ciphertext, &key).expect("decrypt should succeed");
    assert_eq!(recovered, plaintext);
}

#[test]
fn encrypt_uses_a_fresh_nonce_each_time() {
    let key = [0xCDu8; KEY_LEN];
    let plaintext = b"same bytes";

    let (n1, ct1) = encrypt(plaintext, &key).expect("encrypt 1");
    let (n2, ct2) = encrypt(plaintext, &key).expect("encrypt 2");

    assert_ne!(n1, n2, "two encryptions must not share a nonce");
    assert_ne!(ct1, ct2);
}

#[test]
fn decrypt_with_wrong_key_fails_closed() {
    let key = [0x11u8; KEY_LEN];
    let wrong_key = [0x22u8; KEY_LEN];

    let (nonce, ciphertext) = encrypt(b"TOP_SECRET=42", &key).expect("encrypt");
    let err = decrypt(&nonce, &ciphertext, &wrong_key).unwrap_err();

    assert!(matches!(err, PassVaultError::DecryptionFailed));
}

#[test]
fn decrypt_detects_tampering() {
    let key = [0x33u8; KEY_LEN];
    let (nonce, mut ciphertext) = encrypt(b"github:alice:p@ss1", &key).expect("encrypt");

    ciphertext[0] ^= 0x01;
    assert!(matches!(
        decrypt(&nonce, &ciphertext, &key),
        Err(PassVaultError::DecryptionFailed)
    ));
}

#[test]
fn decrypt_with_wrong_nonce_fails() {
    let key = [0x44u8; KEY_LEN];
    let (mut nonce, ciphertext) = encrypt(b"payload", &key).expect("encrypt");

    nonce[NONCE_LEN - 1] ^= 0xFF;
    assert!(matches!(
        decrypt(&nonce, &ciphertext, &key),
        Err(PassVaultError::DecryptionFailed)
    ));
}

#[test]
fn decrypt_with_truncated_ciphertext_fails() {
    let key = [0xAAu8; KEY_LEN];
    let result = decrypt(&[0u8; NONCE_LEN], &[0u8; 5], &key);
    assert!(matches!(result, Err(PassVaultError::DecryptionFailed)));
}

#[test]
fn encrypt_rejects_short_key() {
    let result = encrypt(b"payload", &[0u8; 24]);
    assert!(matches!(result, Err(PassVaultError::InvalidKey(_))));
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

#[test]
fn derive_key_is_deterministic() {
    let salt = [0x42u8; SALT_LEN];
    let k1 = derive_key_with_params(b"Sup3rSecret!", &salt, &cheap_params()).unwrap();
    let k2 = derive_key_with_params(b"Sup3rSecret!", &salt, &cheap_params()).unwrap();
    assert_eq!(k1.as_bytes(), k2.as_bytes());
}

#[test]
fn derive_key_depends_on_passphrase_and_salt() {
    let salt = [0x42u8; SALT_LEN];
    let base = derive_key_with_params(b"password-one", &salt, &cheap_params()).unwrap();

    let other_pw = derive_key_with_params(b"password-two", &salt, &cheap_params()).unwrap();
    assert_ne!(base.as_bytes(), other_pw.as_bytes());

    let other_salt =
        derive_key_with_params(b"password-one", &[0x43u8; SALT_LEN], &cheap_params()).unwrap();
    assert_ne!(base.as_bytes(), other_salt.as_bytes());
}

#[test]
fn derive_key_depends_on_params() {
    let salt = [0x42u8; SALT_LEN];
    let a = derive_key_with_params(b"pw", &salt, &cheap_params()).unwrap();
    let b = derive_key_with_params(
        b"pw",
        &salt,
        &Argon2Params {
            iterations: 2,
            ..cheap_params()
        },
    )
    .unwrap();
    assert_ne!(a.as_bytes(), b.as_bytes());
}

#[test]
fn derive_key_uses_the_default_params() {
    let salt = [0x24u8; SALT_LEN];
    let a = derive_key(b"Sup3rSecret!", &salt).unwrap();
    let b = derive_key_with_params(b"Sup3rSecret!", &salt, &Argon2Params::default()).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());
}

#[test]
fn derive_key_rejects_empty_inputs() {
    assert!(matches!(
        derive_key_with_params(b"", &[1u8; SALT_LEN], &cheap_params()),
        Err(PassVaultError::InvalidInput(_))
    ));
    assert!(matches!(
        derive_key_with_params(b"pw", &[], &cheap_params()),
        Err(PassVaultError::InvalidInput(_))
    ));
}

// ---------------------------------------------------------------------------
// Full workflow
// ---------------------------------------------------------------------------

#[test]
fn salt_then_key_then_encrypt_roundtrip() {
    let salt = generate_salt().unwrap();
    assert_eq!(salt.len(), SALT_LEN);

    let key = derive_key_with_params(b"Sup3rSecret!", &salt, &cheap_params()).unwrap();
    let (nonce, ct) = encrypt(b"vault payload", key.as_bytes()).unwrap();

    let again = derive_key_with_params(b"Sup3rSecret!", &salt, &cheap_params()).unwrap();
    assert_eq!(decrypt(&nonce, &ct, again.as_bytes()).unwrap(), b"vault payload");

    let wrong = derive_key_with_params(b"not-it", &salt, &cheap_params()).unwrap();
    assert!(decrypt(&nonce, &ct, wrong.as_bytes()).is_err());
}
