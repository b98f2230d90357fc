use crate::error::{HarvestError, Result};
use crate::models::NamedArray;
use crate::utils::constants::SHAPES_METADATA_KEY;
use crate::writers::dataset_writer::row_width;
use arrow::array::{Array, Float64Array, StringArray, UInt32Array};
use ndarray::{ArrayD, IxDyn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read access to a dataset store written by
/// [`DatasetWriter`](crate::writers::DatasetWriter).
pub struct DatasetReader {
    path: PathBuf,
    shapes: Vec<(String, Vec<usize>)>,
}

impl DatasetReader {
    /// Open a store and read its array directory. Values are loaded lazily.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let shapes = read_shapes(reader.metadata().file_metadata().key_value_metadata())
            .map_err(|message| invalid_store(path, message))?;

        debug!(path = %path.display(), arrays = shapes.len(), "Opened dataset store");

        Ok(Self {
            path: path.to_path_buf(),
            shapes,
        })
    }

    /// Array names and shapes, in write order.
    pub fn arrays(&self) -> &[(String, Vec<usize>)] {
        &self.shapes
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shapes.iter().any(|(n, _)| n == name)
    }

    pub fn read_array(&self, name: &str) -> Result<Option<NamedArray>> {
        if !self.contains(name) {
            return Ok(None);
        }
        let mut arrays = self.load(|candidate| candidate == name)?;
        Ok(arrays.pop())
    }

    pub fn read_all(&self) -> Result<Vec<NamedArray>> {
        self.load(|_| true)
    }

    fn load<F>(&self, wanted: F) -> Result<Vec<NamedArray>>
    where
        F: Fn(&str) -> bool,
    {
        let invalid = |message: String| invalid_store(&self.path, message);

        let selected: Vec<&(String, Vec<usize>)> =
            self.shapes.iter().filter(|(name, _)| wanted(name)).collect();

        let mut buffers: HashMap<&str, (usize, Vec<f64>)> = selected
            .iter()
            .copied()
            .map(|(name, shape)| {
                (
                    name.as_str(),
                    (row_width(shape), vec![f64::NAN; shape.iter().product()]),
                )
            })
            .collect();

        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        for batch_result in reader {
            let batch = batch_result?;

            let datasets = batch
                .column(0)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| invalid("Invalid dataset column type".to_string()))?;
            let rows = batch
                .column(1)
                .as_any()
                .downcast_ref::<UInt32Array>()
                .ok_or_else(|| invalid("Invalid row column type".to_string()))?;
            let columns = batch
                .column(2)
                .as_any()
                .downcast_ref::<UInt32Array>()
                .ok_or_else(|| invalid("Invalid column column type".to_string()))?;
            let values = batch
                .column(3)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| invalid("Invalid value column type".to_string()))?;

            for i in 0..batch.num_rows() {
                let name = datasets.value(i);
                if !wanted(name) {
                    continue;
                }

                let (width, buffer) = buffers
                    .get_mut(name)
                    .ok_or_else(|| invalid(format!("Array '{}' has no recorded shape", name)))?;
                let position = rows.value(i) as usize * *width + columns.value(i) as usize;

                let slot = buffer.get_mut(position).ok_or_else(|| {
                    invalid(format!("Element {} is outside array '{}'", position, name))
                })?;
                *slot = values.value(i);
            }
        }

        selected
            .into_iter()
            .map(|(name, shape)| {
                let buffer = buffers
                    .remove(name.as_str())
                    .map(|(_, buffer)| buffer)
                    .unwrap_or_default();
                let data = ArrayD::from_shape_vec(IxDyn(shape), buffer)?;
                Ok(NamedArray::new(name.clone(), data))
            })
            .collect()
    }

    /// File-level details of the store.
    pub fn info(&self) -> Result<StoreInfo> {
        let file = File::open(&self.path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let compression = if metadata.num_row_groups() > 0
            && metadata.row_group(0).num_columns() > 0
        {
            metadata.row_group(0).column(0).compression()
        } else {
            Compression::UNCOMPRESSED
        };

        Ok(StoreInfo {
            arrays: self.shapes.clone(),
            total_rows: metadata.file_metadata().num_rows(),
            row_groups: metadata.num_row_groups() as i32,
            file_size: std::fs::metadata(&self.path)?.len(),
            compression,
        })
    }
}

fn invalid_store(path: &Path, message: String) -> HarvestError {
    HarvestError::InvalidStore {
        path: path.to_path_buf(),
        message,
    }
}

fn read_shapes(
    metadata: Option<&Vec<KeyValue>>,
) -> std::result::Result<Vec<(String, Vec<usize>)>, String> {
    let raw = metadata
        .and_then(|entries| entries.iter().find(|kv| kv.key == SHAPES_METADATA_KEY))
        .and_then(|kv| kv.value.as_deref())
        .ok_or_else(|| format!("Missing '{}' metadata", SHAPES_METADATA_KEY))?;

    let shapes: Map<String, Value> =
        serde_json::from_str(raw).map_err(|e| format!("Unreadable shape metadata: {}", e))?;

    shapes
        .into_iter()
        .map(|(name, shape)| {
            serde_json::from_value::<Vec<usize>>(shape)
                .map(|dims| (name.clone(), dims))
                .map_err(|e| format!("Invalid shape for '{}': {}", name, e))
        })
        .collect()
}

#[derive(Debug)]
pub struct StoreInfo {
    pub arrays: Vec<(String, Vec<usize>)>,
    pub total_rows: i64,
    pub row_groups: i32,
    pub file_size: u64,
    pub compression: Compression,
}

impl StoreInfo {
    pub fn contains(&self, name: &str) -> bool {
        self.arrays.iter().any(|(n, _)| n == name)
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Dataset Store Summary:\n\
            - Arrays: {}\n\
            - Stored elements: {}\n\
            - Row groups: {}\n\
            - File size: {:.2} MB\n\
            - Compression: {:?}",
            self.arrays.len(),
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1_048_576.0,
            self.compression,
        );

        for (name, shape) in &self.arrays {
            summary.push_str(&format!("\n    {}: {:?}", name, shape));
        }

        summary
    }
}
