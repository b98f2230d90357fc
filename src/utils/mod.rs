pub mod constants;
pub mod coordinates;
pub mod progress;

pub use constants::*;
pub use coordinates::{format_coordinate_key, parse_coordinate_key};
pub use progress::ProgressReporter;
