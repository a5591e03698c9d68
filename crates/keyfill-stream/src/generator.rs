//! Block-wise content generation
//!
//! Each block is the encryption of `n` zero bytes, so the concatenated output
//! is exactly the CTR keystream truncated to the requested length.

use std::iter::FusedIterator;
use std::num::NonZeroUsize;

use crate::cipher::{CipherMode, KeystreamCipher};
use crate::kdf::derive_stream_key;

/// Produces successive keystream blocks until `length` bytes have been emitted.
#[derive(Debug)]
pub struct ContentGenerator {
    cipher: KeystreamCipher,
    block_size: NonZeroUsize,
    remaining: u64,
}

impl ContentGenerator {
    pub fn new(cipher: KeystreamCipher, length: u64, block_size: NonZeroUsize) -> Self {
        Self {
            cipher,
            block_size,
            remaining: length,
        }
    }

    /// Derive the key for `(seed, length)` and generate its content.
    pub fn for_seed(seed: &[u8], length: u64, block_size: NonZeroUsize) -> Self {
        let cipher = derive_stream_key(seed, length).cipher(CipherMode::Encrypt);
        Self::new(cipher, length, block_size)
    }

    pub fn block_size(&self) -> NonZeroUsize {
        self.block_size
    }

    /// Bytes still to be emitted.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    /// Emit the next block: `min(block_size, remaining)` bytes, or an empty
    /// buffer once the full length has been produced.
    pub fn next_block(&mut self) -> Vec<u8> {
        let n = self.next_len();
        let mut block = vec![0u8; n];
        self.emit(&mut block);
        block
    }

    /// Emit the next block into `buf`, reusing its allocation.
    /// Returns the block length (zero when finished).
    pub fn next_block_into(&mut self, buf: &mut Vec<u8>) -> usize {
        let n = self.next_len();
        buf.clear();
        buf.resize(n, 0);
        self.emit(buf);
        n
    }

    fn next_len(&self) -> usize {
        // remaining can exceed usize::MAX on 32-bit targets; block_size cannot
        match usize::try_from(self.remaining) {
            Ok(rem) => rem.min(self.block_size.get()),
            Err(_) => self.block_size.get(),
        }
    }

    fn emit(&mut self, zeros: &mut [u8]) {
        if zeros.is_empty() {
            return;
        }
        self.cipher.apply(zeros);
        self.remaining -= zeros.len() as u64;
    }
}

impl Iterator for ContentGenerator {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.is_finished() {
            None
        } else {
            Some(self.next_block())
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let blocks = self.remaining.div_ceil(self.block_size.get() as u64);
        match usize::try_from(blocks) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl FusedIterator for ContentGenerator {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FOOBAR_35_KEYSTREAM: &str =
        "4b8f9192dbb63b55750a24b3ab9e882507c1a77de2e6e4a60e1945dabb5bc799e71a9b";

    fn bs(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_foobar_35_block_lengths() {
        let mut gen = ContentGenerator::for_seed(b"foobar", 35, bs(16));

        let b1 = gen.next_block();
        let b2 = gen.next_block();
        let b3 = gen.next_block();
        assert_eq!((b1.len(), b2.len(), b3.len()), (16, 16, 3));
        assert!(gen.is_finished());

        let content: Vec<u8> = [b1, b2, b3].concat();
        assert_eq!(hex(&content), FOOBAR_35_KEYSTREAM);
    }

    #[test]
    fn test_finished_generator_keeps_returning_empty() {
        let mut gen = ContentGenerator::for_seed(b"foobar", 35, bs(16));
        while !gen.next_block().is_empty() {}

        for _ in 0..5 {
            assert!(gen.next_block().is_empty());
        }
        assert_eq!(gen.remaining(), 0);
    }

    #[test]
    fn test_zero_length_is_immediately_empty() {
        let mut gen = ContentGenerator::for_seed(b"empty", 0, bs(16));
        assert!(gen.is_finished());
        assert!(gen.next_block().is_empty());
        assert_eq!(gen.next(), None);
    }

    #[test]
    fn test_length_below_block_size() {
        let blocks: Vec<_> = ContentGenerator::for_seed(b"short", 5, bs(16)).collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), 5);
    }

    #[test]
    fn test_exact_multiple_has_no_short_block() {
        let blocks: Vec<_> = ContentGenerator::for_seed(b"aligned", 64, bs(16)).collect();
        assert_eq!(blocks.len(), 4);
        assert!(blocks.iter().all(|b| b.len() == 16));
    }

    #[test]
    fn test_block_size_does_not_change_content() {
        let small: Vec<u8> = ContentGenerator::for_seed(b"foobar", 35, bs(1))
            .flatten()
            .collect();
        let large: Vec<u8> = ContentGenerator::for_seed(b"foobar", 35, bs(4096))
            .flatten()
            .collect();
        assert_eq!(hex(&small), FOOBAR_35_KEYSTREAM);
        assert_eq!(small, large);
    }

    #[test]
    fn test_next_block_into_reuses_buffer() {
        let mut gen = ContentGenerator::for_seed(b"foobar", 35, bs(16));
        let mut buf = Vec::new();
        let mut content = Vec::new();
        loop {
            let n = gen.next_block_into(&mut buf);
            if n == 0 {
                break;
            }
            assert_eq!(buf.len(), n);
            content.extend_from_slice(&buf);
        }
        assert!(buf.is_empty());
        assert_eq!(hex(&content), FOOBAR_35_KEYSTREAM);
    }

    #[test]
    fn test_size_hint_counts_blocks() {
        let gen = ContentGenerator::for_seed(b"foobar", 35, bs(16));
        assert_eq!(gen.size_hint(), (3, Some(3)));
    }

    proptest! {
        #[test]
        fn output_length_is_exact(length in 0u64..=4096, block in 1usize..=257) {
            let mut gen = ContentGenerator::for_seed(b"prop", length, bs(block));
            let mut total = 0u64;
            loop {
                let b = gen.next_block();
                if b.is_empty() {
                    break;
                }
                prop_assert!(b.len() <= block);
                total += b.len() as u64;
            }
            prop_assert_eq!(total, length);
            prop_assert!(gen.next_block().is_empty());
        }

        #[test]
        fn output_is_deterministic(
            seed in proptest::collection::vec(any::<u8>(), 0..64),
            length in 0u64..=1024,
        ) {
            let a: Vec<u8> = ContentGenerator::for_seed(&seed, length, bs(16)).flatten().collect();
            let b: Vec<u8> = ContentGenerator::for_seed(&seed, length, bs(16)).flatten().collect();
            prop_assert_eq!(a, b);
        }
    }
}
