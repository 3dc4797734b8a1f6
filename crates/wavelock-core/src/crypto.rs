//! Password-based key derivation and block encryption of artifacts.
//!
//! Keys come from PBKDF2-HMAC-SHA256. Artifacts are encrypted with Blowfish
//! in CBC mode under a fresh random 8-byte IV with PKCS#7 padding, and the
//! persisted layout is `IV || ciphertext` with no length or algorithm tag.
//! The decrypting party has to know cipher, mode and IV length out of band.
//!
//! The content hash is SHA-256 over the ciphertext. It identifies the
//! encrypted blob; it does not authenticate the plaintext.

use blowfish::Blowfish;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;
use zeroize::Zeroizing;

type BlowfishCbcEnc = cbc::Encryptor<Blowfish>;
type BlowfishCbcDec = cbc::Decryptor<Blowfish>;

/// IV length in bytes (the Blowfish block size).
pub const IV_LEN: usize = 8;

/// Cipher block size in bytes.
pub const BLOCK_LEN: usize = 8;

/// Hardcoded default salt. Every key derived with it is flagged.
pub const DEFAULT_SALT: &str = "salt";

pub const DEFAULT_ITERATIONS: u32 = 100_000;
pub const DEFAULT_KEY_LENGTH: usize = 32;

/// Blowfish accepts keys of 4 to 56 bytes.
pub const MIN_KEY_LENGTH: usize = 4;
pub const MAX_KEY_LENGTH: usize = 56;

/// Errors from key derivation and the cipher.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation or cipher initialization failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The blob is malformed or the key does not match.
    #[error("Decryption failed: {0}")]
    Decryption(String),
}

/// PBKDF2 parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    pub salt: String,
    pub iterations: u32,
    /// Derived key length in bytes.
    pub key_length: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.to_string(),
            iterations: DEFAULT_ITERATIONS,
            key_length: DEFAULT_KEY_LENGTH,
        }
    }
}

impl KdfParams {
    /// True when the salt is the hardcoded default.
    pub fn uses_default_salt(&self) -> bool {
        self.salt == DEFAULT_SALT
    }

    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.iterations == 0 {
            return Err(CryptoError::Encryption(
                "PBKDF2 iteration count must be at least 1".to_string(),
            ));
        }
        if !(MIN_KEY_LENGTH..=MAX_KEY_LENGTH).contains(&self.key_length) {
            return Err(CryptoError::Encryption(format!(
                "key length {} outside {MIN_KEY_LENGTH}..={MAX_KEY_LENGTH} bytes",
                self.key_length
            )));
        }
        Ok(())
    }
}

/// Derived symmetric key, wiped on drop.
pub type Key = Zeroizing<Vec<u8>>;

/// Derive a key from `password` with PBKDF2-HMAC-SHA256.
pub fn derive_key(password: &str, params: &KdfParams) -> Result<Key, CryptoError> {
    params.validate()?;
    if params.uses_default_salt() {
        warn!("deriving key with the hardcoded default salt; configure a per-deployment salt");
    }

    let mut key = Zeroizing::new(vec![0u8; params.key_length]);
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        params.salt.as_bytes(),
        params.iterations,
        &mut key,
    );
    Ok(key)
}

/// Output of [`encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedArtifact {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
    /// Lowercase hex SHA-256 of `ciphertext`.
    pub content_hash: String,
}

impl EncryptedArtifact {
    /// Persisted layout: `IV || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the persisted layout and recompute the content hash.
    pub fn from_bytes(blob: &[u8]) -> Result<Self, CryptoError> {
        if blob.len() < IV_LEN + BLOCK_LEN {
            return Err(CryptoError::Decryption(format!(
                "blob of {} bytes is shorter than IV plus one block",
                blob.len()
            )));
        }
        let (iv_bytes, ciphertext) = blob.split_at(IV_LEN);
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::Decryption(format!(
                "ciphertext length {} is not a multiple of {BLOCK_LEN}",
                ciphertext.len()
            )));
        }

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);
        Ok(Self {
            iv,
            ciphertext: ciphertext.to_vec(),
            content_hash: content_hash(ciphertext),
        })
    }

    /// First `len` characters of the content hash.
    pub fn short_hash(&self, len: usize) -> &str {
        match self.content_hash.char_indices().nth(len) {
            Some((end, _)) => &self.content_hash[..end],
            None => &self.content_hash,
        }
    }
}

/// Lowercase hex SHA-256 digest.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Encrypt `plaintext` under a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<EncryptedArtifact, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    encrypt_with_iv(plaintext, key, iv)
}

fn encrypt_with_iv(
    plaintext: &[u8],
    key: &[u8],
    iv: [u8; IV_LEN],
) -> Result<EncryptedArtifact, CryptoError> {
    let cipher = BlowfishCbcEnc::new_from_slices(key, &iv)
        .map_err(|e| CryptoError::Encryption(format!("cipher init: {e}")))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let content_hash = content_hash(&ciphertext);

    Ok(EncryptedArtifact {
        iv,
        ciphertext,
        content_hash,
    })
}

/// Decrypt a persisted `IV || ciphertext` blob.
pub fn decrypt(blob: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let artifact = EncryptedArtifact::from_bytes(blob)?;
    decrypt_artifact(&artifact, key)
}

pub fn decrypt_artifact(artifact: &EncryptedArtifact, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = BlowfishCbcDec::new_from_slices(key, &artifact.iv)
        .map_err(|e| CryptoError::Decryption(format!("cipher init: {e}")))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&artifact.ciphertext)
        .map_err(|_| CryptoError::Decryption("invalid padding (wrong key?)".to_string()))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..200), key in proptest::collection::vec(any::<u8>(), 4..=56)) {
            let artifact = encrypt(&plaintext, &key).unwrap();
            prop_assert_eq!(decrypt(&artifact.to_bytes(), &key).unwrap(), plaintext);
        }
    }
}
