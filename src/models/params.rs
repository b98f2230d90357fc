use crate::error::{HarvestError, Result};
use crate::models::{Coordinate, DatasetKind};
use crate::utils::constants::ENV_PREFIX;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use validator::Validate;

/// Run parameters read from the JSON parameters file.
///
/// ```json
/// {
///   "from": "2020-01-01",
///   "to": "2020-01-02",
///   "coordinates": [[60.5, 3.0], [61.0, 4.0]],
///   "wind_keys": ["ws10", "wd10"],
///   "solar_keys": ["t2m", "ssrd", "fdir"]
/// }
/// ```
///
/// The dates are passed to the API untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunParams {
    #[validate(length(min = 1))]
    pub from: String,

    #[validate(length(min = 1))]
    pub to: String,

    #[validate(length(min = 1), nested)]
    pub coordinates: Vec<Coordinate>,

    #[serde(default)]
    pub wind_keys: Vec<String>,

    #[serde(default)]
    pub solar_keys: Vec<String>,
}

impl RunParams {
    /// Load parameters from a JSON file, with `METOCEAN_*` environment
    /// variables overriding individual fields (e.g. `METOCEAN_FROM`).
    pub fn load(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Json))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("wind_keys")
                    .with_list_parse_key("solar_keys"),
            )
            .build()?;

        let params: RunParams = settings.try_deserialize()?;
        params.validate()?;

        debug!(
            path = %path.display(),
            coordinates = params.coordinates.len(),
            "Loaded run parameters"
        );

        Ok(params)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: RunParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Resolve the key list bound to a dataset kind.
    pub fn keys_for(&self, kind: DatasetKind) -> Result<&[String]> {
        let keys = match kind {
            DatasetKind::Wind => &self.wind_keys,
            DatasetKind::Solar => &self.solar_keys,
        };

        if keys.is_empty() {
            return Err(HarvestError::Config(format!(
                "'{}' is empty or missing; nothing to fetch for {} data",
                kind.keys_field(),
                kind
            )));
        }

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PARAMS: &str = r#"{
        "from": "2020-01-01T00:00:00Z",
        "to": "2020-01-01T03:00:00Z",
        "coordinates": [[60.5, 3.0], [61, 4]],
        "wind_keys": ["ws10", "wd10"],
        "solar_keys": ["t2m", "ssrd", "fdir"]
    }"#;

    #[test]
    fn test_from_json() {
        let params = RunParams::from_json(PARAMS).unwrap();
        assert_eq!(params.coordinates.len(), 2);
        assert_eq!(params.coordinates[1], Coordinate::new(61.0, 4.0));
        assert_eq!(params.keys_for(DatasetKind::Wind).unwrap(), ["ws10", "wd10"]);
        assert_eq!(params.keys_for(DatasetKind::Solar).unwrap().len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PARAMS.as_bytes()).unwrap();

        let params = RunParams::load(file.path()).unwrap();
        assert_eq!(params.from, "2020-01-01T00:00:00Z");
        assert_eq!(params.coordinates[0], Coordinate::new(60.5, 3.0));
    }

    #[test]
    fn test_empty_coordinates_rejected() {
        let json = r#"{"from": "a", "to": "b", "coordinates": [], "wind_keys": ["ws10"]}"#;
        assert!(matches!(
            RunParams::from_json(json),
            Err(HarvestError::Validation(_))
        ));
    }

    #[test]
    fn test_out_of_range_coordinate_rejected() {
        let json = r#"{"from": "a", "to": "b", "coordinates": [[95.0, 3.0]]}"#;
        assert!(RunParams::from_json(json).is_err());
    }

    #[test]
    fn test_missing_key_list() {
        let json = r#"{"from": "a", "to": "b", "coordinates": [[60.0, 3.0]], "wind_keys": ["ws10"]}"#;
        let params = RunParams::from_json(json).unwrap();
        let err = params.keys_for(DatasetKind::Solar).unwrap_err();
        assert!(err.to_string().contains("solar_keys"));
    }
}
