pub mod array_analyzer;

pub use array_analyzer::{ArrayAnalyzer, ArrayStatistics, GeographicBounds, StoreStatistics};
