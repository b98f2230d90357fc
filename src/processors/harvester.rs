use crate::client::{BatchFetcher, FetchObserver, UrlBuilder};
use crate::error::{HarvestError, Result};
use crate::models::{
    AggregationMode, Coordinate, DatasetKind, Hindcast, RequestDescriptor, RunParams,
};
use crate::processors::{derive, rasterize_polygon, AggregationReport, ResponseAggregator};
use crate::utils::constants::{DEFAULT_BASE_URL, DEFAULT_OUTPUT_FILE};
use crate::writers::{CommitSummary, DatasetWriter};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Everything one harvest run needs to know.
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    pub params: RunParams,
    pub dataset: DatasetKind,
    pub mode: AggregationMode,
    /// Expand the four configured corners into every enclosed grid point.
    pub square: bool,
    pub source: Hindcast,
    pub base_url: String,
    pub output: PathBuf,
}

impl HarvestRequest {
    pub fn new(params: RunParams, dataset: DatasetKind, mode: AggregationMode) -> Self {
        Self {
            params,
            dataset,
            mode,
            square: false,
            source: Hindcast::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
        }
    }

    pub fn keys(&self) -> Result<&[String]> {
        self.params.keys_for(self.dataset)
    }

    pub fn resolve_coordinates(&self) -> Result<Vec<Coordinate>> {
        if !self.square {
            return Ok(self.params.coordinates.clone());
        }

        let expanded = rasterize_polygon(&self.params.coordinates)?;
        info!(
            corners = self.params.coordinates.len(),
            points = expanded.len(),
            "Expanded area to grid coordinates"
        );
        Ok(expanded)
    }

    /// Fail before any request is sent when a derived quantity needs a key
    /// the run does not fetch.
    pub fn check_derivation_sources(&self) -> Result<()> {
        let keys = self.keys()?;
        for quantity in self.dataset.derived_quantities(keys) {
            if let Some(missing) = quantity
                .sources()
                .iter()
                .find(|source| !keys.iter().any(|k| k == *source))
            {
                return Err(HarvestError::MissingDependency {
                    derived: quantity.key().to_string(),
                    missing: missing.to_string(),
                });
            }
        }
        Ok(())
    }

    /// One request per resolved coordinate, in coordinate order.
    pub fn plan(&self) -> Result<Vec<RequestDescriptor>> {
        self.check_derivation_sources()?;
        let coordinates = self.resolve_coordinates()?;
        let builder = UrlBuilder::new(self.keys()?, &self.params.from, &self.params.to)
            .with_base_url(&self.base_url)
            .with_source(self.source);

        Ok(builder.build(&coordinates))
    }
}

#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub requested: usize,
    pub report: AggregationReport,
    pub derived: Vec<String>,
    pub commit: CommitSummary,
    pub output: PathBuf,
}

impl HarvestSummary {
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Requests: {}", self.requested),
            self.report.summary(),
        ];
        if !self.derived.is_empty() {
            lines.push(format!("Derived: {}", self.derived.join(", ")));
        }
        lines.push(format!(
            "Wrote {} to {}{}",
            self.commit.written.join(", "),
            self.output.display(),
            if self.commit.coordinates_written {
                " (with coordinates)"
            } else {
                ""
            }
        ));
        lines.join("\n")
    }
}

/// Runs fetch, aggregation, derivation and persistence for one request.
pub struct Harvester {
    fetcher: BatchFetcher,
    writer: DatasetWriter,
}

impl Harvester {
    pub fn new(fetcher: BatchFetcher, writer: DatasetWriter) -> Self {
        Self { fetcher, writer }
    }

    #[instrument(skip_all, fields(dataset = %request.dataset, mode = %request.mode))]
    pub async fn run(
        &self,
        request: &HarvestRequest,
        observer: Option<&dyn FetchObserver>,
    ) -> Result<HarvestSummary> {
        let keys = request.keys()?;
        let descriptors = request.plan()?;
        info!(
            requests = descriptors.len(),
            waves = self.fetcher.wave_count(descriptors.len()),
            source = %request.source,
            "Starting harvest"
        );

        let outcomes = self.fetcher.fetch_all(&descriptors, observer).await;

        let mut aggregator = ResponseAggregator::new();
        aggregator.ingest_all(&outcomes)?;
        let (mut data, report) = aggregator.finish()?;

        if report.succeeded == 0 {
            return Err(HarvestError::NoData {
                total: report.total,
            });
        }

        let quantities = request.dataset.derived_quantities(keys);
        derive(&mut data.tensors, &quantities)?;

        let staged = self.writer.stage(&data, request.mode)?;
        let commit = self.writer.commit(&request.output, staged)?;

        Ok(HarvestSummary {
            requested: descriptors.len(),
            report,
            derived: quantities.iter().map(|q| q.key().to_string()).collect(),
            commit,
            output: request.output.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(coordinates: &str) -> RunParams {
        RunParams::from_json(&format!(
            r#"{{
                "from": "2020-01-01",
                "to": "2020-01-02",
                "coordinates": {},
                "wind_keys": ["ws10"],
                "solar_keys": ["ssrd", "fdir"]
            }}"#,
            coordinates
        ))
        .unwrap()
    }

    #[test]
    fn test_plan_without_expansion() {
        let request = HarvestRequest::new(
            params("[[60, 3], [61.5, 4]]"),
            DatasetKind::Wind,
            AggregationMode::Individual,
        );
        let plan = request.plan().unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].index, 1);
        assert!(plan[1].url.contains("latitude=61.5"));
        assert!(plan[1].url.contains("keys=ws10"));
    }

    #[test]
    fn test_plan_with_square() {
        let mut request = HarvestRequest::new(
            params("[[0, 0], [0, 2], [2, 2], [2, 0]]"),
            DatasetKind::Solar,
            AggregationMode::Averaged,
        );
        request.square = true;

        assert_eq!(request.resolve_coordinates().unwrap().len(), 9);
        let plan = request.plan().unwrap();
        assert_eq!(plan.len(), 9);
        assert!(plan.iter().all(|d| d.url.contains("keys=ssrd&keys=fdir")));
    }

    #[test]
    fn test_square_needs_four_corners() {
        let mut request = HarvestRequest::new(
            params("[[0, 0], [0, 2]]"),
            DatasetKind::Wind,
            AggregationMode::Individual,
        );
        request.square = true;
        assert!(matches!(request.plan(), Err(HarvestError::InvalidInput(_))));
    }

    #[test]
    fn test_solar_without_ssrd_fails_at_planning() {
        let mut p = params("[[60, 3]]");
        p.solar_keys = vec!["t2m".to_string(), "fdir".to_string()];
        let request = HarvestRequest::new(p, DatasetKind::Solar, AggregationMode::Averaged);

        match request.plan() {
            Err(HarvestError::MissingDependency { derived, missing }) => {
                assert_eq!(derived, "ghi");
                assert_eq!(missing, "ssrd");
            }
            other => panic!("expected MissingDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_wind_needs_no_radiation_keys() {
        let request = HarvestRequest::new(
            params("[[60, 3]]"),
            DatasetKind::Wind,
            AggregationMode::Individual,
        );
        assert!(request.check_derivation_sources().is_ok());
    }

    #[test]
    fn test_empty_key_list_is_rejected() {
        let mut p = params("[[60, 3]]");
        p.wind_keys.clear();
        let request = HarvestRequest::new(p, DatasetKind::Wind, AggregationMode::Individual);
        assert!(matches!(request.plan(), Err(HarvestError::Config(_))));
    }
}
