use crate::error::{HarvestError, Result};
use crate::models::VariableTensors;
use crate::utils::constants::SECONDS_PER_HOUR;
use ndarray::Array2;
use tracing::debug;

/// Secondary quantities computed from fetched radiation variables.
///
/// `ssrd` and `fdir` are hourly accumulations in J/m²; dividing by the
/// accumulation window gives mean irradiance in W/m².
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedQuantity {
    /// Global horizontal irradiance: `ssrd / 3600`
    Ghi,
    /// Diffuse horizontal irradiance: `ssrd / 3600 - fdir / 3600`
    Dhi,
}

impl DerivedQuantity {
    pub fn key(&self) -> &'static str {
        match self {
            DerivedQuantity::Ghi => "ghi",
            DerivedQuantity::Dhi => "dhi",
        }
    }

    pub fn sources(&self) -> &'static [&'static str] {
        match self {
            DerivedQuantity::Ghi => &["ssrd"],
            DerivedQuantity::Dhi => &["ssrd", "fdir"],
        }
    }

    fn compute(&self, tensors: &VariableTensors) -> Result<Array2<f64>> {
        let source = |name: &str| {
            tensors
                .get(name)
                .ok_or_else(|| HarvestError::MissingDependency {
                    derived: self.key().to_string(),
                    missing: name.to_string(),
                })
        };

        match self {
            DerivedQuantity::Ghi => Ok(source("ssrd")? / SECONDS_PER_HOUR),
            DerivedQuantity::Dhi => {
                let ssrd = source("ssrd")?;
                let fdir = source("fdir")?;
                if ssrd.dim() != fdir.dim() {
                    return Err(HarvestError::ShapeMismatch(format!(
                        "Cannot derive 'dhi': ssrd has shape {:?} but fdir has shape {:?}",
                        ssrd.shape(),
                        fdir.shape()
                    )));
                }
                Ok(ssrd / SECONDS_PER_HOUR - fdir / SECONDS_PER_HOUR)
            }
        }
    }
}

impl std::fmt::Display for DerivedQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Add each derived quantity to `tensors`.
///
/// Every quantity is computed against the tensors as they were before this
/// call, and nothing is inserted unless all of them succeed.
pub fn derive(tensors: &mut VariableTensors, quantities: &[DerivedQuantity]) -> Result<()> {
    let mut derived = Vec::with_capacity(quantities.len());

    for quantity in quantities {
        if tensors.contains_key(quantity.key()) {
            return Err(HarvestError::DerivedKeyCollision(quantity.key().to_string()));
        }
        derived.push((quantity.key(), quantity.compute(tensors)?));
    }

    for (key, tensor) in derived {
        debug!(key, shape = ?tensor.shape(), "Derived variable");
        tensors.insert(key.to_string(), tensor);
    }

    Ok(())
}
