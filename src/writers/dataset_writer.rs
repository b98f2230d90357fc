//! Named-array store backed by a single Parquet file.
//!
//! Arrays are stored in long form, one row per element:
//!
//! | dataset | row | column | value |
//! |---------|-----|--------|-------|
//!
//! and the shape of each array is kept in the file's key-value metadata under
//! `metocean.shapes` as a JSON object `{ name: [dims...] }`, in write order.
//! 1-D arrays use `row = 0`.
//!
//! A store is append-only: new arrays may be added, but an existing array is
//! never replaced. Each commit rewrites the file through a temporary file in
//! the same directory, so a failed commit leaves the previous file untouched.

use crate::error::{HarvestError, Result};
use crate::models::{AggregatedData, AggregationMode, NamedArray};
use crate::utils::constants::{
    AVERAGED_SUFFIX, COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY,
    COMPRESSION_ZSTD, COORDINATES_DATASET, DEFAULT_ROW_GROUP_SIZE, SHAPES_METADATA_KEY,
};
use crate::writers::DatasetReader;
use arrow::array::{Float64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{Array1, Array2, Axis};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Element-wise mean across the coordinate axis.
pub fn average_over_coordinates(tensor: &Array2<f64>) -> Option<Array1<f64>> {
    tensor.mean_axis(Axis(0))
}

/// Arrays prepared for one commit.
#[derive(Debug, Clone)]
pub struct StagedArrays {
    pub coordinates: NamedArray,
    pub variables: Vec<NamedArray>,
}

impl StagedArrays {
    pub fn names(&self) -> Vec<&str> {
        self.variables.iter().map(|a| a.name.as_str()).collect()
    }
}

/// What a commit added to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub written: Vec<String>,
    pub coordinates_written: bool,
}

pub struct DatasetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl DatasetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(HarvestError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    /// Turn aggregated tensors into named arrays for the given mode.
    ///
    /// Averaged mode stores `"<key>-avg"` as a 1-D time series; individual
    /// mode stores `"<key>"` as `(coordinate, time step)`.
    pub fn stage(&self, data: &AggregatedData, mode: AggregationMode) -> Result<StagedArrays> {
        let coordinates =
            NamedArray::new(COORDINATES_DATASET, data.coordinate_array().into_dyn());

        let variables = data
            .tensors
            .iter()
            .map(|(key, tensor)| match mode {
                AggregationMode::Individual => {
                    Ok(NamedArray::new(key.clone(), tensor.clone().into_dyn()))
                }
                AggregationMode::Averaged => average_over_coordinates(tensor)
                    .map(|mean| {
                        NamedArray::new(format!("{}{}", key, AVERAGED_SUFFIX), mean.into_dyn())
                    })
                    .ok_or(HarvestError::NoData { total: 0 }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StagedArrays {
            coordinates,
            variables,
        })
    }

    /// Add staged arrays to the store at `path`, creating it if needed.
    ///
    /// Every name is checked before anything is written: if any variable
    /// already exists the store is left unchanged. The coordinate array is
    /// only written when the store does not have one yet.
    pub fn commit(&self, path: &Path, staged: StagedArrays) -> Result<CommitSummary> {
        let existing = if path.exists() {
            DatasetReader::open(path)?.read_all()?
        } else {
            Vec::new()
        };

        let existing_names: HashSet<&str> = existing.iter().map(|a| a.name.as_str()).collect();

        let mut seen = HashSet::new();
        for array in &staged.variables {
            if array.name == COORDINATES_DATASET
                || existing_names.contains(array.name.as_str())
                || !seen.insert(array.name.as_str())
            {
                return Err(HarvestError::DuplicateDataset {
                    name: array.name.clone(),
                    path: path.to_path_buf(),
                });
            }
        }

        let coordinates_written = match existing.iter().find(|a| a.name == COORDINATES_DATASET) {
            Some(current) => {
                if current.data != staged.coordinates.data {
                    warn!(
                        path = %path.display(),
                        "Store already holds a different '{}' array; keeping the existing one",
                        COORDINATES_DATASET
                    );
                }
                false
            }
            None => true,
        };

        let written: Vec<String> = staged.variables.iter().map(|a| a.name.clone()).collect();

        let mut arrays = existing;
        if coordinates_written {
            arrays.push(staged.coordinates);
        }
        arrays.extend(staged.variables);

        self.write_arrays(path, &arrays)?;

        for name in &written {
            info!(dataset = %name, path = %path.display(), "Created dataset");
        }

        Ok(CommitSummary {
            written,
            coordinates_written,
        })
    }

    /// Write `arrays` as the full content of the store at `path`.
    pub fn write_arrays(&self, path: &Path, arrays: &[NamedArray]) -> Result<()> {
        let schema = Self::create_schema();
        let batch = Self::arrays_to_batch(arrays, schema.clone())?;

        let mut shapes = Map::new();
        for array in arrays {
            shapes.insert(array.name.clone(), Value::from(array.shape().to_vec()));
        }

        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .set_key_value_metadata(Some(vec![KeyValue::new(
                SHAPES_METADATA_KEY.to_string(),
                Value::Object(shapes).to_string(),
            )]))
            .build();

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&directory)?;

        let mut temp_file = NamedTempFile::new_in(&directory)?;
        let mut writer = ArrowWriter::try_new(temp_file.as_file_mut(), schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        temp_file
            .persist(path)
            .map_err(|e| HarvestError::Io(e.error))?;

        debug!(
            path = %path.display(),
            arrays = arrays.len(),
            rows = batch.num_rows(),
            "Wrote store"
        );
        Ok(())
    }

    fn create_schema() -> Arc<Schema> {
        let fields = vec![
            Field::new("dataset", DataType::Utf8, false),
            Field::new("row", DataType::UInt32, false),
            Field::new("column", DataType::UInt32, false),
            Field::new("value", DataType::Float64, false),
        ];

        Arc::new(Schema::new(fields))
    }

    fn arrays_to_batch(arrays: &[NamedArray], schema: Arc<Schema>) -> Result<RecordBatch> {
        let total: usize = arrays.iter().map(NamedArray::len).sum();

        let mut datasets: Vec<&str> = Vec::with_capacity(total);
        let mut rows: Vec<u32> = Vec::with_capacity(total);
        let mut columns: Vec<u32> = Vec::with_capacity(total);
        let mut values: Vec<f64> = Vec::with_capacity(total);

        for array in arrays {
            let width = row_width(array.shape());
            for (i, value) in array.data.iter().enumerate() {
                datasets.push(&array.name);
                rows.push((i / width) as u32);
                columns.push((i % width) as u32);
                values.push(*value);
            }
        }

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(datasets)),
                Arc::new(UInt32Array::from(rows)),
                Arc::new(UInt32Array::from(columns)),
                Arc::new(Float64Array::from(values)),
            ],
        )?;

        Ok(batch)
    }
}

impl Default for DatasetWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Elements per row when flattening an array into (row, column) pairs.
pub(crate) fn row_width(shape: &[usize]) -> usize {
    let width: usize = if shape.len() >= 2 {
        shape[1..].iter().product()
    } else {
        shape.iter().product()
    };
    width.max(1)
}
