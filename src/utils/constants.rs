/// API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.gateway.equinor.com/metocean";
pub const API_VERSION: &str = "v1";

/// Credential environment variables
pub const ENV_TOKEN: &str = "token";
pub const ENV_SUBSCRIPTION_KEY: &str = "ocp";

/// Prefix for environment overrides of run parameters (METOCEAN_FROM, ...)
pub const ENV_PREFIX: &str = "METOCEAN";

/// Request scheduling defaults
pub const DEFAULT_WAVE_SIZE: usize = 5;
pub const DEFAULT_COOLDOWN_SECS: u64 = 15;
pub const DEFAULT_TIMEOUT_SECS: u64 = 1000;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 30;
pub const MAX_RETRY_DELAY_SECS: u64 = 300;

/// Store layout
pub const COORDINATES_DATASET: &str = "coordinates";
pub const AVERAGED_SUFFIX: &str = "-avg";
pub const SHAPES_METADATA_KEY: &str = "metocean.shapes";
pub const DEFAULT_OUTPUT_FILE: &str = "data.parquet";
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;

/// Accumulation window of the radiation variables, in seconds
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
