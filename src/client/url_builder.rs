use crate::models::{Coordinate, Hindcast, RequestDescriptor};
use crate::utils::constants::DEFAULT_BASE_URL;
use tracing::debug;

/// Formats one data request URL per coordinate.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base_url: String,
    source: Hindcast,
    keys: Vec<String>,
    from: String,
    to: String,
}

impl UrlBuilder {
    pub fn new(keys: &[String], from: &str, to: &str) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            source: Hindcast::default(),
            keys: keys.to_vec(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_source(mut self, source: Hindcast) -> Self {
        self.source = source;
        self
    }

    pub fn url_for(&self, coordinate: &Coordinate) -> String {
        format!(
            "{}/{}/data?from={}&to={}&longitude={}&latitude={}&keys={}",
            self.base_url,
            self.source.path_segment(),
            self.from,
            self.to,
            coordinate.longitude,
            coordinate.latitude,
            self.keys.join("&keys=")
        )
    }

    /// Build descriptors in coordinate order; `index` is the coordinate position.
    pub fn build(&self, coordinates: &[Coordinate]) -> Vec<RequestDescriptor> {
        coordinates
            .iter()
            .enumerate()
            .map(|(index, coordinate)| {
                let url = self.url_for(coordinate);
                debug!(index, url = %url, "Built request URL");
                RequestDescriptor::new(url, index)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn builder() -> UrlBuilder {
        let keys = vec!["t2m".to_string(), "ssrd".to_string(), "fdir".to_string()];
        UrlBuilder::new(&keys, "2020-01-01", "2020-02-01")
    }

    #[test]
    fn test_url_format() {
        let url = builder().url_for(&Coordinate::new(60.5, 3.0));
        assert_eq!(
            url,
            "https://api.gateway.equinor.com/metocean/era/5/data?from=2020-01-01&to=2020-02-01\
             &longitude=3&latitude=60.5&keys=t2m&keys=ssrd&keys=fdir"
        );
    }

    #[test]
    fn test_source_and_base_url() {
        let url = builder()
            .with_base_url("http://localhost:8080/metocean/")
            .with_source(Hindcast::Nora10)
            .url_for(&Coordinate::new(61.0, 4.25));
        assert!(url.starts_with("http://localhost:8080/metocean/nora/10/data?"));
        assert!(url.contains("&longitude=4.25&latitude=61&"));
    }

    #[test]
    fn test_build_preserves_order() {
        let coordinates = vec![
            Coordinate::new(60.0, 3.0),
            Coordinate::new(61.0, 3.0),
            Coordinate::new(62.0, 3.0),
        ];
        let descriptors = builder().build(&coordinates);

        assert_eq!(descriptors.len(), 3);
        for (i, descriptor) in descriptors.iter().enumerate() {
            assert_eq!(descriptor.index, i);
            assert!(descriptor
                .url
                .contains(&format!("latitude={}", coordinates[i].latitude)));
        }
    }
}
