//! AES-256-GCM sealing for option values kept at rest.
//!
//! Ciphertexts are `[nonce (12 bytes)] || [ciphertext+tag]`, Base64 encoded.
//! The key is derived from the site UID, which is computed from the public site
//! URL. Sealing binds a value to its site and keeps it out of casual view; it
//! does not protect it from anyone who knows the URL.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use rand::rngs::OsRng;
use rand::TryRngCore;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use sha2::{Digest, Sha256};

use crate::errors::{LicenseError, LicenseResult};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96-bit).
pub const NONCE_SIZE: usize = 12;

/// Derive a 256-bit key from arbitrary material.
pub fn derive_key(material: &str) -> [u8; KEY_SIZE] {
    let digest = Sha256::digest(format!("fla-option-store:{material}").as_bytes());
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest);
    key
}

/// Seals and opens values with one fixed key.
#[derive(Clone)]
pub struct Sealer {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for Sealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sealer").field("key", &"<redacted>").finish()
    }
}

impl Sealer {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    pub fn from_material(material: &str) -> Self {
        Self::new(derive_key(material))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    pub fn seal(&self, plaintext: &[u8]) -> LicenseResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| LicenseError::EncryptionError(format!("nonce generation failed: {e}")))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut ciphertext = self
            .cipher()
            .encrypt(nonce, plaintext)
            .map_err(|e| LicenseError::EncryptionError(format!("encryption failed: {e}")))?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.append(&mut ciphertext);

        Ok(B64.encode(output))
    }

    pub fn open(&self, sealed: &str) -> LicenseResult<Vec<u8>> {
        let decoded = B64
            .decode(sealed.trim())
            .map_err(|e| LicenseError::DecryptionError(format!("base64 decode failed: {e}")))?;

        if decoded.len() <= NONCE_SIZE {
            return Err(LicenseError::DecryptionError(
                "ciphertext too short".to_string(),
            ));
        }

        let (nonce_bytes, ct) = decoded.split_at(NONCE_SIZE);
        self.cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), ct)
            .map_err(|e| LicenseError::DecryptionError(format!("decryption failed: {e}")))
    }

    pub fn seal_str(&self, plaintext: &str) -> LicenseResult<String> {
        self.seal(plaintext.as_bytes())
    }

    pub fn open_str(&self, sealed: &str) -> LicenseResult<String> {
        let bytes = self.open(sealed)?;
        String::from_utf8(bytes)
            .map_err(|e| LicenseError::DecryptionError(format!("invalid utf-8: {e}")))
    }
}
