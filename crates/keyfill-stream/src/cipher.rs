//! AES-256-CTR stream cipher instances
//!
//! The counter is the full 128-bit IV block, incremented big-endian, which
//! matches the conventional `aes-256-ctr` construction. CTR encryption and
//! decryption are the same XOR with the keystream; the mode is carried so
//! callers can tell which side of a round trip an instance belongs to.

use aes::cipher::{KeyIvInit, StreamCipher};

use crate::{IV_SIZE, KEY_SIZE};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Encrypt,
    Decrypt,
}

/// A stateful counter-mode cipher. Every call advances the keystream.
pub struct KeystreamCipher {
    mode: CipherMode,
    inner: Aes256Ctr,
    position: u64,
}

impl KeystreamCipher {
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Number of bytes transformed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Transform `buf` in place.
    pub fn apply(&mut self, buf: &mut [u8]) {
        self.inner.apply_keystream(buf);
        self.position += buf.len() as u64;
    }

    /// Transform `input` into a newly allocated buffer of the same length.
    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = input.to_vec();
        self.apply(&mut out);
        out
    }
}

impl std::fmt::Debug for KeystreamCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystreamCipher")
            .field("mode", &self.mode)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Create a cipher instance for `mode` from a key and IV.
pub fn create_cipher(
    mode: CipherMode,
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
) -> KeystreamCipher {
    KeystreamCipher {
        mode,
        inner: Aes256Ctr::new(key.into(), iv.into()),
        position: 0,
    }
}
