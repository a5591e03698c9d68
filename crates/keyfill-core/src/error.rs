use thiserror::Error;

use crate::types::BlockRange;

pub type KeyfillResult<T> = Result<T, KeyfillError>;

#[derive(Debug, Error)]
pub enum KeyfillError {
    /// A block did not decrypt to zeros, or more bytes were fed than declared.
    ///
    /// `range` is the failing block as fed: `[start, start + block_size)` for
    /// full blocks, but a short final block ends at end of input, so
    /// `range.len()` can be less than the block size.
    #[error("content mismatch in byte range {range}")]
    Verification { range: BlockRange },

    /// Input ended before the declared length was verified.
    #[error("content truncated: expected {expected} bytes, read {read}")]
    Truncated { expected: u64, read: u64 },

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid size '{0}'")]
    InvalidSize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeyfillError {
    /// True for content failures, as opposed to I/O or usage errors.
    pub fn is_content_failure(&self) -> bool {
        matches!(
            self,
            KeyfillError::Verification { .. } | KeyfillError::Truncated { .. }
        )
    }
}
