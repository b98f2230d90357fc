use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load run parameters: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unexpected response shape: {0}")]
    ShapeMismatch(String),

    #[error("Cannot derive '{derived}': source variable '{missing}' is not present")]
    MissingDependency { derived: String, missing: String },

    #[error("Derived variable '{0}' would overwrite a fetched variable of the same name")]
    DerivedKeyCollision(String),

    #[error(
        "Dataset '{name}' already exists in {}. Appending to an existing array is not supported",
        .path.display()
    )]
    DuplicateDataset { name: String, path: PathBuf },

    #[error("Invalid dataset store {}: {message}", .path.display())]
    InvalidStore { path: PathBuf, message: String },

    #[error("No usable responses: all {total} requests failed")]
    NoData { total: usize },
}
