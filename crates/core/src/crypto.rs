//! Password encryption at rest.
//!
//! A 256-bit key is derived from the master secret with PBKDF2-HMAC-SHA256
//! (100 000 rounds) over a fresh 16-byte salt, then the password is sealed
//! with AES-256-GCM under a fresh 12-byte nonce. Ciphertext, nonce and salt
//! are stored base64 encoded.
//!
//! ```rust
//! use gleaner_core::crypto::{decrypt_password, encrypt_password};
//!
//! let sealed = encrypt_password("secret", "master").unwrap();
//! assert_eq!(decrypt_password(&sealed, "master").unwrap(), "secret");
//! assert!(decrypt_password(&sealed, "wrong").is_err());
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{GleanerError, Result};

pub const PBKDF2_ROUNDS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;

/// An encrypted password as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedSecret {
    pub encrypted_password: String,
    pub iv: String,
    pub salt: String,
}

fn derive_key(master: &str, salt: &[u8]) -> Key<Aes256Gcm> {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(master.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    *Key::<Aes256Gcm>::from_slice(&key)
}

/// Encrypts `plaintext` under `master` with a fresh salt and IV.
///
/// # Errors
///
/// [`GleanerError::EncryptionFailed`] if the cipher rejects the input.
pub fn encrypt_password(plaintext: &str, master: &str) -> Result<EncryptedSecret> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(&derive_key(master, &salt));
    let sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|_| GleanerError::EncryptionFailed)?;

    Ok(EncryptedSecret { encrypted_password: STANDARD.encode(sealed), iv: STANDARD.encode(iv), salt: STANDARD.encode(salt) })
}

/// Decrypts a sealed password. Fails closed on a wrong master secret, salt
/// or IV; partial plaintext is never returned.
///
/// # Errors
///
/// [`GleanerError::InvalidEncoding`] for malformed base64 and
/// [`GleanerError::DecryptionFailed`] for everything else.
pub fn decrypt_password(secret: &EncryptedSecret, master: &str) -> Result<String> {
    let sealed = STANDARD.decode(&secret.encrypted_password)?;
    let iv = STANDARD.decode(&secret.iv)?;
    let salt = STANDARD.decode(&secret.salt)?;
    if iv.len() != IV_LEN || salt.is_empty() {
        return Err(GleanerError::DecryptionFailed);
    }

    let cipher = Aes256Gcm::new(&derive_key(master, &salt));
    let plain = cipher
        .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
        .map_err(|_| GleanerError::DecryptionFailed)?;
    String::from_utf8(plain).map_err(|_| GleanerError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let sealed = encrypt_password("secret", "master").unwrap();
        assert_eq!(decrypt_password(&sealed, "master").unwrap(), "secret");
    }

    #[test]
    fn test_wrong_master_fails() {
        let sealed = encrypt_password("secret", "master").unwrap();
        assert!(matches!(decrypt_password(&sealed, "Master"), Err(GleanerError::DecryptionFailed)));
    }

    #[test]
    fn test_wrong_salt_or_iv_fails() {
        let sealed = encrypt_password("secret", "master").unwrap();
        let other = encrypt_password("secret", "master").unwrap();

        let swapped_salt = EncryptedSecret { salt: other.salt.clone(), ..sealed.clone() };
        assert!(decrypt_password(&swapped_salt, "master").is_err());

        let swapped_iv = EncryptedSecret { iv: other.iv, ..sealed };
        assert!(decrypt_password(&swapped_iv, "master").is_err());
    }

    #[test]
    fn test_fresh_salt_and_iv_per_call() {
        let a = encrypt_password("secret", "master").unwrap();
        let b = encrypt_password("secret", "master").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encrypted_password, b.encrypted_password);
        assert_eq!(STANDARD.decode(&a.salt).unwrap().len(), SALT_LEN);
        assert_eq!(STANDARD.decode(&a.iv).unwrap().len(), IV_LEN);
    }

    #[test]
    fn test_malformed_base64() {
        let bad = EncryptedSecret { encrypted_password: "***".into(), iv: "AAAA".into(), salt: "AAAA".into() };
        assert!(matches!(decrypt_password(&bad, "master"), Err(GleanerError::InvalidEncoding(_))));
    }

    #[test]
    fn test_serialized_field_names() {
        let sealed = encrypt_password("secret", "master").unwrap();
        let json = serde_json::to_value(&sealed).unwrap();
        assert!(json.get("encryptedPassword").is_some());
        assert!(json.get("iv").is_some());
        assert!(json.get("salt").is_some());
    }
}
