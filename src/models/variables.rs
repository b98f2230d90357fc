use crate::models::Coordinate;
use ndarray::{Array2, ArrayD};
use std::collections::BTreeMap;

/// Variable key to a `(coordinate, time step)` tensor. Every tensor from one
/// run shares the same coordinate indexing.
pub type VariableTensors = BTreeMap<String, Array2<f64>>;

/// Coordinates and tensors produced by one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct AggregatedData {
    pub coordinates: Vec<Coordinate>,
    pub tensors: VariableTensors,
}

impl AggregatedData {
    /// `[count, 2]` array of `(lat, lon)` rows.
    pub fn coordinate_array(&self) -> Array2<f64> {
        let mut array = Array2::zeros((self.coordinates.len(), 2));
        for (i, coordinate) in self.coordinates.iter().enumerate() {
            array[[i, 0]] = coordinate.latitude;
            array[[i, 1]] = coordinate.longitude;
        }
        array
    }
}

/// A named numeric array as held in a dataset store.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArray {
    pub name: String,
    pub data: ArrayD<f64>,
}

impl NamedArray {
    pub fn new(name: impl Into<String>, data: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
