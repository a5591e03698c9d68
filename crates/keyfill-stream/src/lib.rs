//! keyfill-stream: reproducible pseudo-random file content
//!
//! Content for a file is a pure function of `(seed, length)`, where the seed
//! is normally the file's path. Nothing is stored alongside the file: the
//! verifier re-derives the same keystream from the path and the on-disk size.
//!
//! Pipeline:
//! ```text
//! seed || ";" || length ──SHA-256──► key (32 bytes)
//!                  key ──SHA-256──► iv  (first 16 bytes)
//! (key, iv) ──► AES-256-CTR ──► encrypt(zeros) = keystream = file content
//! ```
//!
//! Verification runs the same cipher over the file content; every block must
//! decrypt back to zeros.

pub mod cipher;
pub mod file;
pub mod generator;
pub mod kdf;
pub mod verifier;

use std::num::NonZeroUsize;

pub use cipher::{create_cipher, CipherMode, KeystreamCipher};
pub use file::{seed_for_path, verify_file, write_file, FileOptions, ProgressFn, VerifyReport, WriteReport};
pub use generator::ContentGenerator;
pub use kdf::{derive_stream_key, StreamKey};
pub use verifier::{ContentVerifier, VerifyStatus};

/// Size of the AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the CTR initial counter block in bytes
pub const IV_SIZE: usize = 16;

/// Default block size for generation and verification
pub const DEFAULT_BLOCK_SIZE: NonZeroUsize =
    match NonZeroUsize::new(keyfill_core::config::DEFAULT_BLOCK_SIZE) {
        Some(n) => n,
        None => panic!("default block size must be non-zero"),
    };
