use crate::models::{AggregationMode, DatasetKind, Hindcast};
use crate::utils::constants::{
    COMPRESSION_SNAPPY, DEFAULT_BASE_URL, DEFAULT_COOLDOWN_SECS, DEFAULT_OUTPUT_FILE,
    DEFAULT_TIMEOUT_SECS, DEFAULT_WAVE_SIZE,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "metocean-harvester")]
#[command(about = "Retrieve ERA5/NORA10 hindcast data for wind or solar")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch time series for the configured coordinates and store them
    Fetch {
        #[arg(short = 't', long = "type", value_enum, help = "Variable family to fetch")]
        dataset: DatasetKind,

        #[arg(short, long, help = "Path to the JSON parameters file")]
        config: PathBuf,

        #[arg(
            short,
            long,
            value_enum,
            help = "avg: average over all coordinates, ind: keep every coordinate"
        )]
        mode: AggregationMode,

        #[arg(
            short,
            long,
            help = "Fetch every whole-degree point inside the area spanned by four corner coordinates"
        )]
        square: bool,

        #[arg(long, value_enum, default_value = "era5")]
        source: Hindcast,

        #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        #[arg(long, default_value_t = DEFAULT_WAVE_SIZE, help = "Concurrent requests per wave")]
        wave_size: usize,

        #[arg(long, default_value_t = DEFAULT_COOLDOWN_SECS, help = "Pause between waves")]
        cooldown_secs: u64,

        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, help = "Per-request timeout")]
        timeout_secs: u64,

        #[arg(
            long,
            default_value_t = 0,
            help = "Retries for rate-limited (HTTP 429) requests, with exponential backoff"
        )]
        max_retries: u32,

        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,

        #[arg(long, default_value = COMPRESSION_SNAPPY)]
        compression: String,

        #[arg(long, help = "Print the request URLs and exit without fetching")]
        dry_run: bool,
    },

    /// Display information about a dataset store
    Info {
        #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
        file: PathBuf,

        #[arg(long, help = "Skip per-array value statistics")]
        no_stats: bool,
    },
}
