//! chroma-matte command-line tool
//!
//! Removes solid key-colored backgrounds from images and writes RGBA PNGs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chroma_matte::{
    ChromaKeyConfig, ChromaKeyEngine, InProcessBackend, KeyColor, KeyingStrategy, MagickBackend,
    RasterBackend,
};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Chroma-key background removal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "chroma-matte")]
struct Cli {
    /// Input images (PNG, JPEG, WebP, GIF)
    #[arg(value_name = "INPUT", required = true)]
    input: Vec<PathBuf>,

    /// Output file for a single input, or output directory
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Key color as hex, e.g. #00FF00
    #[arg(short, long, value_name = "HEX")]
    key_color: Option<KeyColor>,

    /// Distance to the key, in percent, under which a pixel is background
    #[arg(short, long, value_name = "PCT")]
    tolerance: Option<f32>,

    /// Keying strategy
    #[arg(short, long, value_enum)]
    strategy: Option<CliStrategy>,

    /// Use the key color as given instead of sampling the image corner
    #[arg(long)]
    no_detect: bool,

    /// Where blur and morphology run
    #[arg(short, long, value_enum, default_value_t = CliBackend::Inprocess)]
    backend: CliBackend,

    /// JSON configuration file; command-line flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum CliStrategy {
    Soft,
    Colorkey,
}

impl From<CliStrategy> for KeyingStrategy {
    fn from(strategy: CliStrategy) -> Self {
        match strategy {
            CliStrategy::Soft => Self::Soft,
            CliStrategy::Colorkey => Self::Colorkey,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum CliBackend {
    /// In-process filters
    Inprocess,
    /// ImageMagick `magick` executable
    Magick,
}

fn init_tracing(verbose: u8) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::try_new(match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        })?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ChromaKeyConfig> {
    let mut config = match &cli.config {
        Some(path) => ChromaKeyConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ChromaKeyConfig::default(),
    };
    if let Some(key) = cli.key_color {
        config = config.with_key_color(key);
    }
    if let Some(tolerance) = cli.tolerance {
        config = config.with_tolerance(tolerance);
    }
    if let Some(strategy) = cli.strategy {
        config = config.with_strategy(strategy.into());
    }
    if cli.no_detect {
        config = config.with_detect_key(false);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Whether `-o` names a directory: an existing one, or any path ending in a
/// separator.
fn names_directory(path: &Path) -> bool {
    path.is_dir()
        || path
            .as_os_str()
            .to_string_lossy()
            .ends_with(std::path::is_separator)
}

/// Output path for `input`: the `-o` file for a single input, else
/// `<stem>_keyed.png` in the `-o` directory or next to the input.
fn output_path(input: &Path, output: Option<&Path>, single: bool) -> PathBuf {
    let file_name = format!(
        "{}_keyed.png",
        input.file_stem().unwrap_or_default().to_string_lossy()
    );
    match output {
        Some(path) if single && !names_directory(path) => path.to_path_buf(),
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

fn run<B: RasterBackend>(engine: &ChromaKeyEngine<B>, cli: &Cli) -> Result<usize> {
    let single = cli.input.len() == 1;
    let output_dir = cli
        .output
        .as_deref()
        .filter(|path| !single || names_directory(path));
    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let mut failures = 0;
    for input in &cli.input {
        let output = output_path(input, cli.output.as_deref(), single);
        match engine.process_file(input, &output) {
            Ok(keyed) => {
                if let Some(reason) = &keyed.fallback_reason {
                    eprintln!(
                        "warning: {} was processed in degraded mode (hard threshold fallback): {reason}",
                        input.display()
                    );
                }
                if !keyed.trimmed {
                    warn!(input = %input.display(), "output is fully transparent");
                }
                info!(
                    input = %input.display(),
                    output = %output.display(),
                    key = %keyed.key_color,
                    mode = %keyed.mode,
                    "wrote {}x{}",
                    keyed.image.width(),
                    keyed.image.height()
                );
            }
            Err(e) => {
                error!(input = %input.display(), "{e:#}");
                failures += 1;
            }
        }
    }
    Ok(failures)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = build_config(&cli)?;
    let failures = match cli.backend {
        CliBackend::Inprocess => run(&ChromaKeyEngine::with_backend(config, InProcessBackend)?, &cli)?,
        CliBackend::Magick => run(&ChromaKeyEngine::with_backend(config, MagickBackend::new())?, &cli)?,
    };

    if failures == cli.input.len() {
        bail!("no image could be processed");
    }
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
