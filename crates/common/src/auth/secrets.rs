//! Secret-at-rest handling for third-party API keys
//!
//! Keys are sealed with AES-256-GCM under a process-wide key derived from
//! the configured passphrase; the stored form is `base64(nonce || ciphertext)`.
//! Plaintext keys exist only in memory between decrypt and use. When served
//! back to clients the key is reduced to `<first4>…<last4>`, and a PUT that
//! echoes that exact mask leaves the stored ciphertext untouched.

use crate::errors::{AppError, Result};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// AES-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Keys shorter than this are masked completely
const MASK_MIN_LEN: usize = 12;

/// Process-wide sealer for secrets at rest
#[derive(Clone)]
pub struct SecretBox {
    key: [u8; 32],
}

impl SecretBox {
    /// Derive the cipher key from a configured passphrase
    pub fn from_passphrase(passphrase: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(passphrase.as_bytes());
        let digest = hasher.finalize();

        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypt a plaintext secret for storage
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Crypto {
                message: format!("AES-GCM encrypt: {}", e),
            })?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    /// Decrypt a stored secret for use
    pub fn open(&self, sealed: &str) -> Result<String> {
        let combined = STANDARD.decode(sealed).map_err(|e| AppError::Crypto {
            message: format!("base64 decode: {}", e),
        })?;

        if combined.len() <= NONCE_LEN {
            return Err(AppError::Crypto {
                message: "ciphertext too short".to_string(),
            });
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::Crypto {
                message: format!("AES-GCM decrypt: {}", e),
            })?;

        String::from_utf8(plaintext).map_err(|_| AppError::Crypto {
            message: "decrypted secret is not UTF-8".to_string(),
        })
    }
}

/// Mask an API key to `<first4>…<last4>` for display.
///
/// Short keys are masked completely so the mask never reveals the whole
/// value.
pub fn mask_key(plain: &str) -> String {
    let chars: Vec<char> = plain.chars().collect();
    if chars.len() < MASK_MIN_LEN {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// Whether a submitted key is exactly the mask of the stored one,
/// i.e. the client sent the displayed value back unchanged.
pub fn is_unchanged_mask(candidate: &str, stored_plain: &str) -> bool {
    candidate == mask_key(stored_plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let sealer = SecretBox::from_passphrase("unit-test-passphrase");
        let sealed = sealer.seal("sk-proj-abcdef123456").unwrap();
        assert_ne!(sealed, "sk-proj-abcdef123456");
        assert_eq!(sealer.open(&sealed).unwrap(), "sk-proj-abcdef123456");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let a = SecretBox::from_passphrase("passphrase-a");
        let b = SecretBox::from_passphrase("passphrase-b");
        let sealed = a.seal("secret").unwrap();
        assert!(b.open(&sealed).is_err());
    }

    #[test]
    fn test_nonce_is_random() {
        let sealer = SecretBox::from_passphrase("unit-test-passphrase");
        let first = sealer.seal("secret").unwrap();
        let second = sealer.seal("secret").unwrap();
        assert_ne!(first, second);
        assert_eq!(sealer.open(&first).unwrap(), sealer.open(&second).unwrap());
    }

    #[test]
    fn test_garbage_ciphertext_rejected() {
        let sealer = SecretBox::from_passphrase("unit-test-passphrase");
        assert!(sealer.open("not base64 at all!").is_err());
        assert!(sealer.open(&STANDARD.encode(b"short")).is_err());
    }

    #[test]
    fn test_mask_format() {
        assert_eq!(mask_key("sk-proj-abc123xyz9"), "sk-p…xyz9");
        assert_eq!(mask_key("0123456789ab"), "0123…89ab");
    }

    #[test]
    fn test_short_keys_fully_masked() {
        assert_eq!(mask_key("tiny"), "****");
        assert_eq!(mask_key("0123456789a"), "****");
    }

    #[test]
    fn test_unchanged_detection() {
        let stored = "sk-proj-abc123xyz9";
        assert!(is_unchanged_mask("sk-p…xyz9", stored));
        assert!(!is_unchanged_mask("sk-proj-fresh-key99", stored));
        assert!(!is_unchanged_mask(stored, stored));
    }
}
