//! Key derivation: (seed, length) → AES-256 key + CTR IV
//!
//! ```text
//! M   = seed || ";" || decimal(length)
//! key = SHA-256(M)
//! iv  = SHA-256(key)[..16]
//! ```

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::cipher::{create_cipher, CipherMode, KeystreamCipher};
use crate::{IV_SIZE, KEY_SIZE};

/// Key and IV for one (seed, length) pair. Zeroized on drop.
#[derive(Clone)]
pub struct StreamKey {
    key: [u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
}

impl StreamKey {
    pub fn from_parts(key: [u8; KEY_SIZE], iv: [u8; IV_SIZE]) -> Self {
        Self { key, iv }
    }

    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    /// Build a fresh cipher instance positioned at the start of the keystream.
    pub fn cipher(&self, mode: CipherMode) -> KeystreamCipher {
        create_cipher(mode, &self.key, &self.iv)
    }
}

impl PartialEq for StreamKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.iv == other.iv
    }
}

impl Eq for StreamKey {}

impl Drop for StreamKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

impl std::fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamKey")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// Derive the key and IV for `seed` at `length` bytes.
///
/// Deterministic and infallible; `length == 0` is valid.
pub fn derive_stream_key(seed: &[u8], length: u64) -> StreamKey {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(b";");
    hasher.update(length.to_string().as_bytes());
    let key: [u8; KEY_SIZE] = hasher.finalize().into();

    let mut second: [u8; 32] = Sha256::digest(key).into();
    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&second[..IV_SIZE]);
    second.zeroize();

    StreamKey::from_parts(key, iv)
}
