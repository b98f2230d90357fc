use crate::error::{HarvestError, Result};
use crate::models::Coordinate;

/// Parse the `"<lat>_<lon>"` key the API uses to label a coordinate block.
///
/// # Examples
/// ```
/// use metocean_harvester::utils::parse_coordinate_key;
///
/// let coordinate = parse_coordinate_key("60.5_-3.25").unwrap();
/// assert_eq!(coordinate.latitude, 60.5);
/// assert_eq!(coordinate.longitude, -3.25);
/// ```
pub fn parse_coordinate_key(key: &str) -> Result<Coordinate> {
    let (lat, lon) = key.split_once('_').ok_or_else(|| {
        HarvestError::ShapeMismatch(format!(
            "Invalid coordinate key: '{}'. Expected format: '<lat>_<lon>'",
            key
        ))
    })?;

    let latitude = parse_component(lat, key)?;
    let longitude = parse_component(lon, key)?;

    Ok(Coordinate::new(latitude, longitude))
}

/// Inverse of [`parse_coordinate_key`].
pub fn format_coordinate_key(coordinate: &Coordinate) -> String {
    format!("{}_{}", coordinate.latitude, coordinate.longitude)
}

fn parse_component(value: &str, key: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            HarvestError::ShapeMismatch(format!(
                "Invalid coordinate value '{}' in key '{}'",
                value, key
            ))
        })
}
