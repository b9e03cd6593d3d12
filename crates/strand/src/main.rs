//! strand: extract coastlines from multispectral satellite imagery.
//!
//! Reads one or two GeoTIFF scenes, computes the NDWI water index,
//! selects a threshold with Otsu's method, and traces the water boundary
//! into a GeoJSON feature collection alongside diagnostic rasters.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin strand -- [OPTIONS] <INPUTS>...
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use strand_pipeline::{paths, RunConfig};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

/// Extract coastlines from multispectral satellite imagery as GeoJSON.
///
/// Computes an NDWI water index over the input scene, thresholds it with
/// Otsu's method, and writes the traced water boundary as lon/lat GeoJSON
/// next to the diagnostic rasters.
#[derive(Parser)]
#[command(name = "strand", version)]
struct Cli {
    /// Input scene, or two single-band scenes (green first, then NIR).
    #[arg(required = true, num_args = 1..=2, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// 1-based band numbers for green and NIR.
    ///
    /// With one input file both bands are read from it; with two input
    /// files the first number selects from the first file and the second
    /// from the second.
    #[arg(short, long, num_args = 2, value_names = ["GREEN", "NIR"], default_values_t = [1, 1])]
    bands: Vec<usize>,

    /// Directory for generated artifacts.
    ///
    /// Must resolve to the current working directory or below; anything
    /// else is replaced by the current working directory.
    #[arg(long, default_value = "")]
    outdir: PathBuf,

    /// Artifact name prefix instead of the first input's file stem.
    #[arg(long)]
    basename: Option<String>,

    /// Sample value marking missing data in the inputs.
    #[arg(long, default_value_t = RunConfig::DEFAULT_NODATA)]
    nodata: f64,

    /// Landsat-8 BQA band used to mask out clouds before extraction.
    #[arg(long, value_name = "PATH")]
    l8bqa: Option<PathBuf>,

    /// Restrict extraction to scenes touching the bundled coastal regions.
    #[arg(long)]
    coastmask: bool,

    /// Minimum traced length in map units; shorter lines are dropped.
    #[arg(long, default_value_t = RunConfig::DEFAULT_MINSIZE)]
    minsize: f64,

    /// Morphological closing radius in pixels (0 disables closing).
    #[arg(long, default_value_t = RunConfig::DEFAULT_CLOSE)]
    close: u32,

    /// Simplification tolerance in degrees; rewrites the output in place.
    #[arg(long, value_name = "TOLERANCE")]
    simple: Option<f64>,

    /// Corner rounding strength, 0.0 (none) to 1.33 (maximal).
    #[arg(long, default_value_t = RunConfig::DEFAULT_SMOOTH)]
    smooth: f64,

    /// Approximate memory budget per processing chunk, in megabytes.
    #[arg(long, value_name = "MB", default_value_t = RunConfig::DEFAULT_CHUNKSIZE)]
    chunksize: f64,

    /// Log verbosity: 0 silent, 1 debug, 2 info, 3 warn, 4-5 error.
    #[arg(
        short,
        long,
        default_value_t = RunConfig::DEFAULT_VERBOSITY,
        value_parser = clap::builder::RangedU64ValueParser::<u8>::new().range(0..=5),
    )]
    verbose: u8,
}

/// Install a stderr subscriber for the requested verbosity.
///
/// Verbosity 0 leaves tracing uninitialized, silencing the run entirely;
/// exit codes still report failures.
fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => return,
        1 => Level::DEBUG,
        2 => Level::INFO,
        3 => Level::WARN,
        _ => Level::ERROR,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Build a [`RunConfig`](strand_pipeline::RunConfig) from CLI arguments.
///
/// The output directory is resolved here so an unusable `--outdir` falls
/// back to the current working directory before the run starts.
fn config_from_cli(cli: Cli) -> RunConfig {
    let bands = match cli.bands.as_slice() {
        &[green, nir] => [green, nir],
        _ => unreachable!("clap enforces exactly two band numbers"),
    };
    RunConfig {
        inputs: cli.inputs,
        bands,
        outdir: paths::validate_outdir(&cli.outdir),
        basename: cli.basename,
        nodata: cli.nodata,
        l8bqa: cli.l8bqa,
        coastmask: cli.coastmask,
        minsize: cli.minsize,
        close: cli.close,
        simple: cli.simple,
        smooth: cli.smooth,
        chunksize: cli.chunksize,
        verbosity: cli.verbose,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = config_from_cli(cli);
    match strand_pipeline::run(&config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("fatal: {err}");
            ExitCode::FAILURE
        }
    }
}
