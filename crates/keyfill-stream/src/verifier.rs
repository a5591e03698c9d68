//! Incremental content verification
//!
//! The verifier decrypts each fed block with the same keystream the generator
//! used. Authentic content decrypts to zeros. State machine:
//!
//! ```text
//!              feed (zeros, remaining > 0)
//!                 ┌──────────┐
//!                 ▼          │
//!   new ──► PartialSuccess ──┘ ── feed (zeros, remaining == 0) ──► Success
//!                 │
//!                 └── feed (non-zero or over length) ──► Failure (sticky)
//! ```

use keyfill_core::BlockRange;

use crate::cipher::{CipherMode, KeystreamCipher};
use crate::kdf::derive_stream_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    /// All declared bytes were fed and matched.
    Success,
    /// Everything fed so far matched; more bytes are expected.
    PartialSuccess,
    /// A block mismatched or the declared length was exceeded.
    Failure,
}

/// Consumes previously generated content and checks it block by block.
#[derive(Debug)]
pub struct ContentVerifier {
    cipher: KeystreamCipher,
    length: u64,
    consumed: u64,
    failed: bool,
    first_failure: Option<BlockRange>,
    scratch: Vec<u8>,
}

impl ContentVerifier {
    pub fn new(cipher: KeystreamCipher, length: u64) -> Self {
        Self {
            cipher,
            length,
            consumed: 0,
            failed: false,
            first_failure: None,
            scratch: Vec::new(),
        }
    }

    /// Derive the key for `(seed, length)` and verify against it.
    pub fn for_seed(seed: &[u8], length: u64) -> Self {
        let cipher = derive_stream_key(seed, length).cipher(CipherMode::Decrypt);
        Self::new(cipher, length)
    }

    /// Feed the next block of content.
    ///
    /// Length is checked before any decryption. Once `Failure` has been
    /// returned, every later call returns `Failure` without looking at input.
    pub fn feed(&mut self, block: &[u8]) -> VerifyStatus {
        let start = self.consumed;
        self.consumed = self.consumed.saturating_add(block.len() as u64);

        if self.failed {
            return VerifyStatus::Failure;
        }
        if self.consumed > self.length {
            return self.fail(start, block.len());
        }

        self.scratch.clear();
        self.scratch.extend_from_slice(block);
        self.cipher.apply(&mut self.scratch);

        if self.scratch.iter().any(|&b| b != 0) {
            return self.fail(start, block.len());
        }
        self.status()
    }

    /// Current state without feeding anything.
    ///
    /// A verifier for a zero-length stream is `Success` before any block.
    pub fn status(&self) -> VerifyStatus {
        if self.failed {
            VerifyStatus::Failure
        } else if self.consumed == self.length {
            VerifyStatus::Success
        } else {
            VerifyStatus::PartialSuccess
        }
    }

    /// Bytes fed so far, including any that caused or followed a failure.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Bytes still expected; zero once the declared length is reached or exceeded.
    pub fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.consumed)
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Byte range of the first block that failed, if any.
    pub fn first_failure(&self) -> Option<BlockRange> {
        self.first_failure
    }

    fn fail(&mut self, start: u64, len: usize) -> VerifyStatus {
        self.failed = true;
        self.first_failure = Some(BlockRange::new(start, start.saturating_add(len as u64)));
        VerifyStatus::Failure
    }
}
