use crate::error::{HarvestError, Result};
use crate::models::NamedArray;
use crate::utils::constants::COORDINATES_DATASET;
use crate::writers::DatasetReader;
use ndarray::Axis;
use std::path::Path;

/// Value statistics for one stored array. NaN elements are counted and
/// excluded from min, max and mean.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayStatistics {
    pub name: String,
    pub shape: Vec<usize>,
    pub elements: usize,
    pub nan_count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ArrayStatistics {
    pub fn valid_count(&self) -> usize {
        self.elements - self.nan_count
    }

    pub fn valid_percentage(&self) -> f64 {
        if self.elements == 0 {
            return 0.0;
        }
        (self.valid_count() as f64 / self.elements as f64) * 100.0
    }

    pub fn summary(&self) -> String {
        if self.valid_count() == 0 {
            return format!("{} {:?}: no valid values", self.name, self.shape);
        }

        format!(
            "{} {:?}: min={:.3}, max={:.3}, mean={:.3}, NaN={} ({:.1}% valid)",
            self.name,
            self.shape,
            self.min,
            self.max,
            self.mean,
            self.nan_count,
            self.valid_percentage()
        )
    }
}

#[derive(Debug)]
pub struct StoreStatistics {
    pub arrays: Vec<ArrayStatistics>,
    pub coordinate_count: Option<usize>,
    pub bounds: Option<GeographicBounds>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeographicBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl StoreStatistics {
    pub fn get(&self, name: &str) -> Option<&ArrayStatistics> {
        self.arrays.iter().find(|a| a.name == name)
    }

    pub fn detailed_summary(&self) -> String {
        let coverage = match (self.coordinate_count, self.bounds) {
            (Some(count), Some(b)) => format!(
                "{} coordinates, {:.2}..{:.2} lat, {:.2}..{:.2} lon",
                count, b.min_lat, b.max_lat, b.min_lon, b.max_lon
            ),
            (Some(count), None) => format!("{} coordinates", count),
            _ => "No coordinate array".to_string(),
        };

        let mut summary = format!("Coverage: {}\n\nVariables:", coverage);
        for array in self.arrays.iter().filter(|a| a.name != COORDINATES_DATASET) {
            summary.push_str(&format!("\n- {}", array.summary()));
        }
        summary
    }
}

pub struct ArrayAnalyzer;

impl ArrayAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_store(&self, path: &Path) -> Result<StoreStatistics> {
        let arrays = DatasetReader::open(path)?.read_all()?;

        if arrays.is_empty() {
            return Err(HarvestError::InvalidStore {
                path: path.to_path_buf(),
                message: "Store holds no arrays".to_string(),
            });
        }

        Ok(self.analyze_arrays(&arrays))
    }

    pub fn analyze_arrays(&self, arrays: &[NamedArray]) -> StoreStatistics {
        let coordinates = arrays
            .iter()
            .find(|a| a.name == COORDINATES_DATASET && a.shape().len() == 2 && a.shape()[1] == 2);

        StoreStatistics {
            arrays: arrays.iter().map(|a| self.analyze_array(a)).collect(),
            coordinate_count: coordinates.map(|c| c.shape()[0]),
            bounds: coordinates.and_then(geographic_bounds),
        }
    }

    pub fn analyze_array(&self, array: &NamedArray) -> ArrayStatistics {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut nan_count = 0;

        for &value in array.data.iter() {
            if value.is_nan() {
                nan_count += 1;
                continue;
            }
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }

        let valid = array.len() - nan_count;
        let (min, max, mean) = if valid == 0 {
            (f64::NAN, f64::NAN, f64::NAN)
        } else {
            (min, max, sum / valid as f64)
        };

        ArrayStatistics {
            name: array.name.clone(),
            shape: array.shape().to_vec(),
            elements: array.len(),
            nan_count,
            min,
            max,
            mean,
        }
    }
}

fn geographic_bounds(coordinates: &NamedArray) -> Option<GeographicBounds> {
    if coordinates.is_empty() {
        return None;
    }

    let latitudes = coordinates.data.index_axis(Axis(1), 0);
    let longitudes = coordinates.data.index_axis(Axis(1), 1);

    Some(GeographicBounds {
        min_lat: latitudes.fold(f64::INFINITY, |a, &b| a.min(b)),
        max_lat: latitudes.fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
        min_lon: longitudes.fold(f64::INFINITY, |a, &b| a.min(b)),
        max_lon: longitudes.fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
    })
}

impl Default for ArrayAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
