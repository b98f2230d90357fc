pub mod coordinate;
pub mod dataset;
pub mod outcome;
pub mod params;
pub mod variables;

pub use coordinate::Coordinate;
pub use dataset::{AggregationMode, DatasetKind, Hindcast};
pub use outcome::{FetchOutcome, RequestDescriptor, STATUS_TOO_MANY_REQUESTS};
pub use params::RunParams;
pub use variables::{AggregatedData, NamedArray, VariableTensors};
