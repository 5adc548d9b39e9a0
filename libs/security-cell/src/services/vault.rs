// libs/security-cell/src/services/vault.rs
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce};
use rand::RngCore;
use thiserror::Error;
use tracing::warn;

use shared_config::AppConfig;

const KEY_LENGTH: usize = 32;
const IV_LENGTH: usize = 16;
const TAG_LENGTH: usize = 16;

/// AES-256-GCM with a 16-byte IV, matching the envelope layout the clinical
/// records were originally written with.
type NotesCipher = AesGcm<Aes256, U16>;

#[derive(Debug, Error, PartialEq)]
pub enum VaultError {
    #[error("ciphertext failed authentication")]
    AuthenticationFailure,

    #[error("invalid envelope format")]
    InvalidEnvelope,

    #[error("encryption failed")]
    EncryptionFailed,
}

/// Symmetric cipher for individual clinical text fields. One process-wide
/// key; each field is sealed independently so they can be rewritten
/// independently.
///
/// Envelope format: `hex(iv):hex(tag):hex(ciphertext)`.
#[derive(Clone)]
pub struct FieldVault {
    key: [u8; KEY_LENGTH],
}

impl FieldVault {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.notes_encryption_key)
    }

    /// The configured secret is right-padded with '0' bytes to 32 and
    /// truncated, the same normalization the stored envelopes were keyed
    /// with.
    pub fn new(secret: &str) -> Self {
        if secret.len() < KEY_LENGTH {
            warn!("notes encryption key is shorter than 32 bytes, padding");
        }
        let mut key = [b'0'; KEY_LENGTH];
        let bytes = secret.as_bytes();
        let take = bytes.len().min(KEY_LENGTH);
        key[..take].copy_from_slice(&bytes[..take]);
        Self { key }
    }

    pub fn encrypt_field(&self, plaintext: &str) -> Result<String, VaultError> {
        let cipher = NotesCipher::new(Key::<NotesCipher>::from_slice(&self.key));

        let mut iv = [0u8; IV_LENGTH];
        rand::thread_rng().fill_bytes(&mut iv);

        let sealed = cipher
            .encrypt(Nonce::<U16>::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| VaultError::EncryptionFailed)?;

        // The AEAD appends the tag; the envelope stores it as its own segment.
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LENGTH);

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    pub fn decrypt_field(&self, envelope: &str) -> Result<String, VaultError> {
        let parts: Vec<&str> = envelope.split(':').collect();
        if parts.len() != 3 {
            return Err(VaultError::InvalidEnvelope);
        }

        let iv = hex::decode(parts[0]).map_err(|_| VaultError::InvalidEnvelope)?;
        let tag = hex::decode(parts[1]).map_err(|_| VaultError::InvalidEnvelope)?;
        let ciphertext = hex::decode(parts[2]).map_err(|_| VaultError::InvalidEnvelope)?;

        if iv.len() != IV_LENGTH || tag.len() != TAG_LENGTH {
            return Err(VaultError::InvalidEnvelope);
        }

        let cipher = NotesCipher::new(Key::<NotesCipher>::from_slice(&self.key));

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let plaintext = cipher
            .decrypt(Nonce::<U16>::from_slice(&iv), sealed.as_ref())
            .map_err(|_| VaultError::AuthenticationFailure)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::InvalidEnvelope)
    }
}
