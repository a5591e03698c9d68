//! File workflows: write generated content to disk, verify it back
//!
//! The only metadata either side needs is the file's path (the seed, unless
//! overridden) and its size. Nothing is embedded in the file itself.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use keyfill_core::config::{StreamConfig, DEFAULT_BUFFER_SIZE};
use keyfill_core::{BlockRange, KeyfillError, KeyfillResult};
use tracing::{debug, info, warn};

use crate::generator::ContentGenerator;
use crate::verifier::{ContentVerifier, VerifyStatus};
use crate::DEFAULT_BLOCK_SIZE;

/// Progress callback: (bytes done, bytes total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Bytes processed between progress callbacks
const PROGRESS_INTERVAL: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FileOptions {
    /// Generation/verification granularity; must match between write and verify
    pub block_size: NonZeroUsize,
    /// Capacity of the buffered reader/writer
    pub buffer_size: usize,
    /// fsync after writing
    pub fsync: bool,
    /// Seed override. `None` uses the path bytes as given.
    pub seed: Option<Vec<u8>>,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            fsync: true,
            seed: None,
        }
    }
}

impl FileOptions {
    pub fn from_config(config: &StreamConfig) -> KeyfillResult<Self> {
        Ok(Self {
            block_size: config.block_size()?,
            buffer_size: config.buffer_size(),
            fsync: config.fsync,
            seed: None,
        })
    }

    fn seed_for(&self, path: &Path) -> Vec<u8> {
        self.seed.clone().unwrap_or_else(|| seed_for_path(path))
    }
}

#[derive(Debug, Clone)]
pub struct WriteReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub blocks: u64,
}

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub blocks: u64,
}

/// The seed bytes for a path: its OS encoding, unchanged.
///
/// `dir/file` and `./dir/file` are different seeds; callers must verify with
/// the same spelling they wrote with.
pub fn seed_for_path(path: &Path) -> Vec<u8> {
    path.as_os_str().as_encoded_bytes().to_vec()
}

/// Create (or truncate) `path` and fill it with `length` bytes of content.
pub fn write_file(
    path: &Path,
    length: u64,
    opts: &FileOptions,
    progress: Option<&ProgressFn>,
) -> KeyfillResult<WriteReport> {
    let seed = opts.seed_for(path);
    debug!(
        path = %path.display(),
        length,
        block_size = opts.block_size.get(),
        "writing content"
    );

    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(opts.buffer_size.max(1), file);
    let mut generator = ContentGenerator::for_seed(&seed, length, opts.block_size);

    let mut block = Vec::with_capacity(opts.block_size.get());
    let mut written = 0u64;
    let mut blocks = 0u64;
    let mut next_report = PROGRESS_INTERVAL;
    loop {
        let n = generator.next_block_into(&mut block);
        if n == 0 {
            break;
        }
        writer.write_all(&block)?;
        written += n as u64;
        blocks += 1;
        if written >= next_report {
            report(progress, written, length, "writing");
            next_report = written + PROGRESS_INTERVAL;
        }
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    if opts.fsync {
        file.sync_all()?;
    }
    report(progress, written, length, "written");

    info!(path = %path.display(), bytes = written, blocks, "content written");
    Ok(WriteReport {
        path: path.to_path_buf(),
        bytes: written,
        blocks,
    })
}

/// Verify that `path` holds exactly the content generated for its seed and
/// current size.
///
/// Returns `KeyfillError::Verification` with the first failing block's byte
/// range on mismatch, `KeyfillError::Truncated` if the file ends early.
pub fn verify_file(
    path: &Path,
    opts: &FileOptions,
    progress: Option<&ProgressFn>,
) -> KeyfillResult<VerifyReport> {
    let seed = opts.seed_for(path);
    let file = File::open(path)?;
    let length = file.metadata()?.len();
    debug!(
        path = %path.display(),
        length,
        block_size = opts.block_size.get(),
        "verifying content"
    );

    let mut reader = BufReader::with_capacity(opts.buffer_size.max(1), file);
    let blocks = verify_reader(&mut reader, &seed, length, opts, progress).inspect_err(|e| {
        match e {
            KeyfillError::Verification { range } => {
                warn!(path = %path.display(), %range, "content mismatch")
            }
            KeyfillError::Truncated { expected, read } => warn!(
                path = %path.display(),
                expected,
                read,
                "file ended before declared length"
            ),
            _ => {}
        }
    })?;

    info!(path = %path.display(), bytes = length, blocks, "content verified");
    Ok(VerifyReport {
        path: path.to_path_buf(),
        bytes: length,
        blocks,
    })
}

/// Check `length` bytes from `reader` against the content for `seed`.
/// Returns the number of blocks fed.
fn verify_reader<R: Read>(
    reader: &mut R,
    seed: &[u8],
    length: u64,
    opts: &FileOptions,
    progress: Option<&ProgressFn>,
) -> KeyfillResult<u64> {
    let mut verifier = ContentVerifier::for_seed(seed, length);

    let mut buf = vec![0u8; opts.block_size.get()];
    let mut blocks = 0u64;
    let mut next_report = PROGRESS_INTERVAL;
    let mut status = verifier.status();
    while status == VerifyStatus::PartialSuccess {
        let n = read_block(reader, &mut buf)?;
        if n == 0 {
            return Err(KeyfillError::Truncated {
                expected: length,
                read: verifier.consumed(),
            });
        }
        status = verifier.feed(&buf[..n]);
        blocks += 1;
        if verifier.consumed() >= next_report {
            report(progress, verifier.consumed(), length, "verifying");
            next_report = verifier.consumed() + PROGRESS_INTERVAL;
        }
    }

    if status == VerifyStatus::Failure {
        let consumed = verifier.consumed();
        let range = verifier
            .first_failure()
            .unwrap_or_else(|| BlockRange::new(consumed, consumed));
        return Err(KeyfillError::Verification { range });
    }

    report(progress, length, length, "verified");
    Ok(blocks)
}

/// Fill `buf` from `reader`, short only at end of input.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn report(progress: Option<&ProgressFn>, done: u64, total: u64, msg: &str) {
    if let Some(cb) = progress {
        cb(done, total, msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn read_block_fills_across_short_reads() {
        let data: Vec<u8> = (0..35).collect();
        let mut r = Trickle { data: &data, step: 3 };
        let mut buf = [0u8; 16];

        assert_eq!(read_block(&mut r, &mut buf).unwrap(), 16);
        assert_eq!(buf[..], data[..16]);
        assert_eq!(read_block(&mut r, &mut buf).unwrap(), 16);
        assert_eq!(read_block(&mut r, &mut buf).unwrap(), 3);
        assert_eq!(buf[..3], data[32..]);
        assert_eq!(read_block(&mut r, &mut buf).unwrap(), 0);
    }

    fn generated(seed: &[u8], length: u64) -> Vec<u8> {
        ContentGenerator::for_seed(seed, length, DEFAULT_BLOCK_SIZE)
            .flatten()
            .collect()
    }

    #[test]
    fn verify_reader_accepts_full_content() {
        let content = generated(b"foobar", 35);
        let blocks = verify_reader(&mut &content[..], b"foobar", 35, &FileOptions::default(), None)
            .unwrap();
        assert_eq!(blocks, 3);
    }

    #[test]
    fn verify_reader_reports_truncation() {
        // Input ends after 20 of the declared 35 bytes
        let content = generated(b"foobar", 35);
        let mut r = Trickle { data: &content[..20], step: 7 };

        let err = verify_reader(&mut r, b"foobar", 35, &FileOptions::default(), None).unwrap_err();
        match err {
            KeyfillError::Truncated { expected, read } => {
                assert_eq!(expected, 35);
                assert_eq!(read, 20);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn verify_reader_reports_truncation_on_block_boundary() {
        let content = generated(b"foobar", 35);
        let err = verify_reader(&mut &content[..32], b"foobar", 35, &FileOptions::default(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            KeyfillError::Truncated { expected: 35, read: 32 }
        ));
    }

    #[test]
    fn verify_reader_empty_input_for_zero_length() {
        let blocks = verify_reader(&mut &b""[..], b"empty", 0, &FileOptions::default(), None).unwrap();
        assert_eq!(blocks, 0);
    }

    #[test]
    fn verify_reader_localizes_corruption() {
        let mut content = generated(b"foobar", 35);
        content[20] ^= 0x01;
        let err = verify_reader(&mut &content[..], b"foobar", 35, &FileOptions::default(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            KeyfillError::Verification { range } if range == BlockRange::new(16, 32)
        ));
    }

    #[test]
    fn seed_defaults_to_path_bytes() {
        let opts = FileOptions::default();
        assert_eq!(opts.seed_for(Path::new("dir/file")), b"dir/file".to_vec());

        let opts = FileOptions {
            seed: Some(b"custom".to_vec()),
            ..FileOptions::default()
        };
        assert_eq!(opts.seed_for(Path::new("dir/file")), b"custom".to_vec());
    }

    #[test]
    fn options_from_config() {
        let config = StreamConfig {
            block_size: 4096,
            buffer_size: 0,
            fsync: false,
        };
        let opts = FileOptions::from_config(&config).unwrap();
        assert_eq!(opts.block_size.get(), 4096);
        assert_eq!(opts.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(!opts.fsync);
    }

    #[test]
    fn options_reject_zero_block_size() {
        let config = StreamConfig {
            block_size: 0,
            ..StreamConfig::default()
        };
        assert!(FileOptions::from_config(&config).is_err());
    }
}
