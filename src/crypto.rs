//! Symmetric encryption of notification-channel secrets at rest
//! (spec §3, NotificationChannel invariant: "secrets are never returned in
//! serialisation surfaces").
//!
//! Keyed by the `NOTIFICATION_KEY` environment variable, a base64-encoded
//! 256-bit key. Ciphertext is stored as `base64(nonce || ciphertext)` so a
//! single string column can hold it.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, AeadCore, Key, Nonce};
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("NOTIFICATION_KEY is not configured")]
    MissingKey,
    #[error("NOTIFICATION_KEY is not valid base64")]
    InvalidKeyEncoding,
    #[error("NOTIFICATION_KEY must decode to 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("ciphertext is not valid base64")]
    InvalidCiphertextEncoding,
    #[error("ciphertext is too short to contain a nonce")]
    Truncated,
    #[error("decryption failed")]
    DecryptFailed,
    #[error("encryption failed")]
    EncryptFailed,
}

const NONCE_LEN: usize = 12;

fn load_key(notification_key: &str) -> Result<Key<Aes256Gcm>, CryptoError> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(notification_key)
        .map_err(|_| CryptoError::InvalidKeyEncoding)?;
    if raw.len() != 32 {
        return Err(CryptoError::InvalidKeyLength(raw.len()));
    }
    Ok(*Key::<Aes256Gcm>::from_slice(&raw))
}

/// Encrypts `plaintext` with `notification_key` (base64 32-byte key),
/// returning a base64 string of `nonce || ciphertext`.
pub fn encrypt(notification_key: Option<&str>, plaintext: &str) -> Result<String, CryptoError> {
    let key = load_key(notification_key.ok_or(CryptoError::MissingKey)?)?;
    let cipher = Aes256Gcm::new(&key);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptFailed)?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

/// Reverses [`encrypt`].
pub fn decrypt(notification_key: Option<&str>, encoded: &str) -> Result<String, CryptoError> {
    let key = load_key(notification_key.ok_or(CryptoError::MissingKey)?)?;
    let cipher = Aes256Gcm::new(&key);
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| CryptoError::InvalidCiphertextEncoding)?;
    if raw.len() < NONCE_LEN {
        return Err(CryptoError::Truncated);
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptFailed)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> String {
        base64::engine::general_purpose::STANDARD.encode([7u8; 32])
    }

    #[test]
    fn round_trips() {
        let key = test_key();
        let encoded = encrypt(Some(&key), "sk-twilio-secret").unwrap();
        assert_ne!(encoded, "sk-twilio-secret");
        assert_eq!(decrypt(Some(&key), &encoded).unwrap(), "sk-twilio-secret");
    }

    #[test]
    fn missing_key_is_an_error() {
        assert!(matches!(encrypt(None, "x"), Err(CryptoError::MissingKey)));
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let key = test_key();
        let mut encoded = encrypt(Some(&key), "secret").unwrap();
        encoded.pop();
        encoded.push(if encoded.ends_with('A') { 'B' } else { 'A' });
        assert!(decrypt(Some(&key), &encoded).is_err());
    }
}
