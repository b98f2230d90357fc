use crate::processors::DerivedQuantity;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which family of variables a run fetches. Each kind binds to its own key
/// list in the run parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Wind,
    Solar,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Wind => "wind",
            DatasetKind::Solar => "solar",
        }
    }

    /// Name of the key list in the parameters file this kind reads from.
    pub fn keys_field(&self) -> &'static str {
        match self {
            DatasetKind::Wind => "wind_keys",
            DatasetKind::Solar => "solar_keys",
        }
    }

    /// Secondary quantities computed after aggregation for the given raw keys.
    pub fn derived_quantities(&self, keys: &[String]) -> Vec<DerivedQuantity> {
        match self {
            DatasetKind::Wind => Vec::new(),
            DatasetKind::Solar => {
                let mut quantities = vec![DerivedQuantity::Ghi];
                if keys.iter().any(|k| k == "fdir") {
                    quantities.push(DerivedQuantity::Dhi);
                }
                quantities
            }
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How variable tensors are written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum AggregationMode {
    /// Mean across coordinates, one time series per variable
    #[value(name = "avg")]
    #[serde(rename = "avg")]
    Averaged,
    /// One row per coordinate
    #[value(name = "ind")]
    #[serde(rename = "ind")]
    Individual,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMode::Averaged => "avg",
            AggregationMode::Individual => "ind",
        }
    }
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hindcast archive queried on the metocean API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Hindcast {
    #[default]
    Era5,
    Nora10,
}

impl Hindcast {
    pub fn path_segment(&self) -> &'static str {
        match self {
            Hindcast::Era5 => "era/5",
            Hindcast::Nora10 => "nora/10",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Hindcast::Era5 => "ERA5",
            Hindcast::Nora10 => "NORA10",
        }
    }
}

impl std::fmt::Display for Hindcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hindcast_path_segment() {
        assert_eq!(Hindcast::default().path_segment(), "era/5");
        assert_eq!(Hindcast::Nora10.path_segment(), "nora/10");
    }

    #[test]
    fn test_derived_quantities_by_kind() {
        assert!(DatasetKind::Wind
            .derived_quantities(&keys(&["ws10", "wd10"]))
            .is_empty());
        assert_eq!(
            DatasetKind::Solar.derived_quantities(&keys(&["t2m", "ssrd"])),
            vec![DerivedQuantity::Ghi]
        );
        assert_eq!(
            DatasetKind::Solar.derived_quantities(&keys(&["ssrd", "fdir"])),
            vec![DerivedQuantity::Ghi, DerivedQuantity::Dhi]
        );
    }
}
