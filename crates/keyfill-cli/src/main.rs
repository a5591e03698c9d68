//! keyfill: reproducible test-file writer and verifier
//!
//! Commands:
//!   write <path> <length>   - fill a file with the keystream for (path, length)
//!   verify <path>...        - check files against the keystream for (path, size)
//!   derive <seed> <length>  - print the derived key and IV (debugging)
//!   config show             - display the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use keyfill_core::config::KeyfillConfig;
use keyfill_core::{fmt_bytes, parse_size};
use keyfill_stream::{derive_stream_key, verify_file, write_file, FileOptions, ProgressFn};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "keyfill",
    version,
    about = "Reproducible pseudo-random test files",
    long_about = "keyfill: write files whose content is derived from their path and size, \
                  and verify them later without storing checksums"
)]
struct Cli {
    /// Path to config.toml
    #[arg(long, short = 'c', env = "KEYFILL_CONFIG", default_value = "/etc/keyfill/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, env = "KEYFILL_LOG")]
    log: Option<String>,

    /// Log format; overrides config
    #[arg(long, env = "KEYFILL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write `length` bytes of generated content to `path`
    ///
    /// Length accepts unit suffixes: 4096, 4KiB, 10M, 2GiB.
    Write {
        /// File to create or truncate
        path: PathBuf,
        /// Number of bytes to write
        #[arg(value_parser = parse_size)]
        length: u64,
        /// Seed to derive content from (default: the path as given)
        #[arg(long, short = 's')]
        seed: Option<String>,
        /// Block size in bytes (overrides config)
        #[arg(long, short = 'b')]
        block_size: Option<NonZeroUsize>,
        /// Skip fsync after writing
        #[arg(long)]
        no_fsync: bool,
    },

    /// Verify files against the content derived from their path and size
    Verify {
        /// Files to verify, spelled exactly as when written
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Seed used when writing (only with a single path)
        #[arg(long, short = 's')]
        seed: Option<String>,
        /// Block size in bytes; sets failure localization granularity
        #[arg(long, short = 'b')]
        block_size: Option<NonZeroUsize>,
    },

    /// Print the key and IV derived for a seed and length
    Derive {
        seed: String,
        #[arg(value_parser = parse_size)]
        length: u64,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, from_file) = load_config(&cli.config)?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        from_file,
        "keyfill starting"
    );

    match cli.command {
        Commands::Write { path, length, seed, block_size, no_fsync } => {
            let mut opts = file_options(&config, seed, block_size)?;
            if no_fsync {
                opts.fsync = false;
            }
            cmd_write(&path, length, &opts)
        }
        Commands::Verify { paths, seed, block_size } => {
            if seed.is_some() && paths.len() > 1 {
                anyhow::bail!("--seed can only be used with a single path");
            }
            let opts = file_options(&config, seed, block_size)?;
            cmd_verify(&paths, &opts)
        }
        Commands::Derive { seed, length } => cmd_derive(&seed, length),
        Commands::Config { action: ConfigAction::Show } => {
            cmd_config_show(&config, &cli.config, from_file)
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Load the config file, or defaults if it does not exist.
/// The flag reports whether a file was read.
fn load_config(path: &Path) -> Result<(KeyfillConfig, bool)> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config = KeyfillConfig::from_toml(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((KeyfillConfig::default(), false))
    }
}

fn file_options(
    config: &KeyfillConfig,
    seed: Option<String>,
    block_size: Option<NonZeroUsize>,
) -> Result<FileOptions> {
    let mut opts = FileOptions::from_config(&config.stream).context("invalid stream config")?;
    if let Some(bs) = block_size {
        opts.block_size = bs;
    }
    opts.seed = seed.map(String::into_bytes);
    Ok(opts)
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=>-");
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_callback(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

// ── `keyfill write` ───────────────────────────────────────────────────────────

fn cmd_write(path: &Path, length: u64, opts: &FileOptions) -> Result<()> {
    let pb = make_progress_bar(length, "write");
    let progress = progress_callback(&pb);

    let result = write_file(path, length, opts, Some(&progress));
    pb.finish_and_clear();
    let report = result.with_context(|| format!("writing {}", path.display()))?;

    println!(
        "Wrote {} ({}, {} blocks of {} bytes)",
        report.path.display(),
        fmt_bytes(report.bytes),
        report.blocks,
        opts.block_size,
    );
    Ok(())
}

// ── `keyfill verify` ──────────────────────────────────────────────────────────

fn cmd_verify(paths: &[PathBuf], opts: &FileOptions) -> Result<()> {
    let mut failed = 0usize;

    for path in paths {
        let total = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let pb = make_progress_bar(total, "verify");
        let progress = progress_callback(&pb);

        let result = verify_file(path, opts, Some(&progress));
        pb.finish_and_clear();

        match result {
            Ok(report) => {
                println!("OK    {} ({})", report.path.display(), fmt_bytes(report.bytes));
            }
            Err(e) if e.is_content_failure() => {
                failed += 1;
                println!("FAIL  {}: {e}", path.display());
            }
            Err(e) => {
                failed += 1;
                println!("ERROR {}: {e}", path.display());
            }
        }
    }

    info!(files = paths.len(), failed, "verification finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} file(s) failed verification", paths.len());
    }
    Ok(())
}

// ── `keyfill derive` ──────────────────────────────────────────────────────────

fn cmd_derive(seed: &str, length: u64) -> Result<()> {
    let key = derive_stream_key(seed.as_bytes(), length);
    println!("seed:   {seed}");
    println!("length: {length}");
    println!("key:    {}", hex::encode(key.key()));
    println!("iv:     {}", hex::encode(key.iv()));
    Ok(())
}

// ── `keyfill config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &KeyfillConfig, config_path: &Path, from_file: bool) -> Result<()> {
    if from_file {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config")?;
    print!("{rendered}");
    Ok(())
}
