use crate::error::{HarvestError, Result};
use crate::models::{AggregatedData, Coordinate, FetchOutcome, VariableTensors};
use crate::utils::coordinates::parse_coordinate_key;
use ndarray::Array2;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One variable's series inside a coordinate block.
#[derive(Debug, Deserialize)]
struct VariableEntry {
    key: String,
    value: VariableValues,
}

#[derive(Debug, Deserialize)]
struct VariableValues {
    values: Map<String, Value>,
}

/// Validated `data` section of a response: the coordinate key and its
/// variable entries.
#[derive(Debug)]
pub struct CoordinateBlock<'a> {
    pub key: &'a str,
    pub coordinate: Coordinate,
    pub entries: &'a [Value],
}

impl<'a> CoordinateBlock<'a> {
    /// The `data` object holds either the coordinate block alone, or a
    /// leading wrapper entry followed by the coordinate block. Any other
    /// key count is rejected.
    pub fn from_response(payload: &'a Value) -> Result<Self> {
        let data = payload
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                HarvestError::ShapeMismatch("Response has no 'data' object".to_string())
            })?;

        let key = match data.len() {
            1 | 2 => data.keys().last(),
            _ => None,
        }
        .ok_or_else(|| {
            HarvestError::ShapeMismatch(format!(
                "Coordinate object is not formatted correctly: expected 1 or 2 keys, found {:?}",
                data.keys().collect::<Vec<_>>()
            ))
        })?;

        let entries = data[key].as_array().ok_or_else(|| {
            HarvestError::ShapeMismatch(format!(
                "Coordinate block '{}' is not an array of variables",
                key
            ))
        })?;

        Ok(Self {
            key,
            coordinate: parse_coordinate_key(key)?,
            entries,
        })
    }
}

/// Counts of what happened to the fetched outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub rate_limited: usize,
}

impl AggregationReport {
    pub fn summary(&self) -> String {
        format!(
            "{} of {} coordinates aggregated, {} skipped ({} rate limited)",
            self.succeeded, self.total, self.skipped, self.rate_limited
        )
    }
}

/// Accumulates per-coordinate series into per-variable tensors.
///
/// Failed outcomes are skipped: they add no coordinate and no values.
#[derive(Debug, Default)]
pub struct ResponseAggregator {
    coordinates: Vec<Coordinate>,
    series: BTreeMap<String, Vec<Vec<f64>>>,
    report: AggregationReport,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_all<'a, I>(&mut self, outcomes: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a FetchOutcome>,
    {
        for outcome in outcomes {
            self.ingest(outcome)?;
        }
        Ok(())
    }

    pub fn ingest(&mut self, outcome: &FetchOutcome) -> Result<()> {
        self.report.total += 1;

        let payload = match outcome {
            FetchOutcome::Success(payload) => payload,
            other => {
                self.report.skipped += 1;
                if other.is_rate_limited() {
                    self.report.rate_limited += 1;
                }
                debug!(outcome = %other.describe(), "Skipping failed response");
                return Ok(());
            }
        };

        let block = CoordinateBlock::from_response(payload)?;
        let position = self.coordinates.len();

        for entry in block.entries {
            let entry: VariableEntry = serde_json::from_value(entry.clone()).map_err(|e| {
                HarvestError::ShapeMismatch(format!(
                    "Malformed variable entry for coordinate '{}': {}",
                    block.key, e
                ))
            })?;

            let values = entry
                .value
                .values
                .iter()
                .map(|(timestamp, value)| numeric_value(value, &entry.key, timestamp))
                .collect::<Result<Vec<f64>>>()?;

            let rows = self.series.entry(entry.key.clone()).or_default();
            if rows.len() != position {
                return Err(HarvestError::ShapeMismatch(format!(
                    "Variable '{}' is missing for {} earlier coordinate(s) or repeated at {}",
                    entry.key,
                    position.abs_diff(rows.len()),
                    block.coordinate
                )));
            }
            rows.push(values);
        }

        self.coordinates.push(block.coordinate);
        self.report.succeeded += 1;
        Ok(())
    }

    pub fn report(&self) -> AggregationReport {
        self.report
    }

    /// Build the `(coordinate, time step)` tensors.
    pub fn finish(self) -> Result<(AggregatedData, AggregationReport)> {
        let coordinate_count = self.coordinates.len();
        let mut tensors = VariableTensors::new();

        for (key, rows) in self.series {
            if rows.len() != coordinate_count {
                return Err(HarvestError::ShapeMismatch(format!(
                    "Variable '{}' present for {} of {} coordinates",
                    key,
                    rows.len(),
                    coordinate_count
                )));
            }

            let steps = rows.first().map_or(0, Vec::len);
            if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != steps) {
                return Err(HarvestError::ShapeMismatch(format!(
                    "Variable '{}' has {} time steps at {} but {} at {}",
                    key,
                    row.len(),
                    self.coordinates[i],
                    steps,
                    self.coordinates[0]
                )));
            }

            let flat: Vec<f64> = rows.into_iter().flatten().collect();
            tensors.insert(key, Array2::from_shape_vec((coordinate_count, steps), flat)?);
        }

        if self.report.skipped > 0 {
            warn!("{}", self.report.summary());
        }

        Ok((
            AggregatedData {
                coordinates: self.coordinates,
                tensors,
            },
            self.report,
        ))
    }
}

fn numeric_value(value: &Value, key: &str, timestamp: &str) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => Some(f64::NAN),
        _ => None,
    }
    .ok_or_else(|| {
        HarvestError::ShapeMismatch(format!(
            "Non-numeric value {} for '{}' at {}",
            value, key, timestamp
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn response<const N: usize>(key: &str, variables: &[(&str, [f64; N])]) -> FetchOutcome {
        let entries: Vec<Value> = variables
            .iter()
            .map(|(name, values)| {
                let series: Map<String, Value> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (format!("2020-01-01T{:02}:00:00Z", i), json!(v)))
                    .collect();
                json!({ "key": name, "value": { "values": series } })
            })
            .collect();
        FetchOutcome::Success(json!({ "data": { key: entries } }))
    }

    #[test]
    fn test_tensor_shape() {
        let outcomes: Vec<FetchOutcome> = (0..4)
            .map(|i| response(&format!("6{}_3", i), &[("t2m", [270.0, 271.0, 272.0])]))
            .collect();

        let mut aggregator = ResponseAggregator::new();
        aggregator.ingest_all(&outcomes).unwrap();
        let (data, report) = aggregator.finish().unwrap();

        assert_eq!(data.tensors["t2m"].dim(), (4, 3));
        assert_eq!(data.coordinates.len(), 4);
        assert_eq!(data.coordinates[2], Coordinate::new(62.0, 3.0));
        assert_eq!(report.succeeded, 4);
    }

    #[test]
    fn test_failed_outcomes_skipped() {
        let outcomes = vec![
            response("60_3", &[("t2m", [1.0, 2.0, 3.0])]),
            FetchOutcome::Timeout,
            response("61_3", &[("t2m", [4.0, 5.0, 6.0])]),
            FetchOutcome::HttpError {
                status: 429,
                message: None,
            },
        ];

        let mut aggregator = ResponseAggregator::new();
        aggregator.ingest_all(&outcomes).unwrap();
        let (data, report) = aggregator.finish().unwrap();

        assert_eq!(data.coordinates.len(), 2);
        assert_eq!(data.tensors["t2m"].dim(), (2, 3));
        assert_eq!(
            report,
            AggregationReport {
                total: 4,
                succeeded: 2,
                skipped: 2,
                rate_limited: 1,
            }
        );
        assert_eq!(
            report.summary(),
            "2 of 4 coordinates aggregated, 2 skipped (1 rate limited)"
        );
    }

    #[test]
    fn test_values_keep_insertion_order() {
        let payload = json!({
            "data": {
                "60_3": [{
                    "key": "t2m",
                    "value": { "values": {
                        "2020-01-01T02:00:00Z": 3.0,
                        "2020-01-01T00:00:00Z": 1.0,
                        "2020-01-01T01:00:00Z": "2.0"
                    }}
                }]
            }
        });

        let mut aggregator = ResponseAggregator::new();
        aggregator.ingest(&FetchOutcome::Success(payload)).unwrap();
        let (data, _) = aggregator.finish().unwrap();

        let row: Vec<f64> = data.tensors["t2m"].row(0).to_vec();
        assert_eq!(row, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_two_key_wrapper_uses_second_key() {
        let payload = json!({
            "data": {
                "metadata": { "source": "era5" },
                "59.5_2.25": [{ "key": "ws10", "value": { "values": { "t0": 7.5 } } }]
            }
        });

        let block = CoordinateBlock::from_response(&payload).unwrap();
        assert_eq!(block.key, "59.5_2.25");
        assert_eq!(block.coordinate, Coordinate::new(59.5, 2.25));
        assert_eq!(block.entries.len(), 1);
    }

    #[test]
    fn test_unexpected_key_count_is_fatal() {
        let payload = json!({ "data": { "a": [], "b": [], "60_3": [] } });
        let err = CoordinateBlock::from_response(&payload).unwrap_err();
        assert!(matches!(err, HarvestError::ShapeMismatch(_)));

        let payload = json!({ "data": {} });
        assert!(CoordinateBlock::from_response(&payload).is_err());

        let payload = json!({ "result": [] });
        assert!(CoordinateBlock::from_response(&payload).is_err());
    }

    #[test]
    fn test_ragged_series_rejected() {
        let outcomes = vec![
            response("60_3", &[("t2m", [1.0, 2.0, 3.0])]),
            response("61_3", &[("t2m", [4.0, 5.0])]),
        ];

        let mut aggregator = ResponseAggregator::new();
        aggregator.ingest_all(&outcomes).unwrap();
        let err = aggregator.finish().unwrap_err();
        assert!(err.to_string().contains("time steps"));
    }

    #[test]
    fn test_variable_missing_for_a_coordinate() {
        let outcomes = vec![
            response("60_3", &[("t2m", [1.0]), ("ssrd", [2.0])]),
            response("61_3", &[("t2m", [3.0])]),
        ];

        let mut aggregator = ResponseAggregator::new();
        aggregator.ingest_all(&outcomes).unwrap();
        assert!(matches!(
            aggregator.finish(),
            Err(HarvestError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let payload = json!({
            "data": { "60_3": [{ "key": "t2m", "value": { "values": { "t0": "warm" } } }] }
        });

        let mut aggregator = ResponseAggregator::new();
        let err = aggregator
            .ingest(&FetchOutcome::Success(payload))
            .unwrap_err();
        assert!(err.to_string().contains("warm"));
    }

    #[test]
    fn test_empty_run() {
        let (data, report) = ResponseAggregator::new().finish().unwrap();
        assert!(data.coordinates.is_empty());
        assert!(data.tensors.is_empty());
        assert_eq!(report.total, 0);
    }
}
