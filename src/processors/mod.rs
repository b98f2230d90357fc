pub mod aggregator;
pub mod derivation;
pub mod harvester;
pub mod rasterizer;

pub use aggregator::{AggregationReport, CoordinateBlock, ResponseAggregator};
pub use derivation::{derive, DerivedQuantity};
pub use harvester::{HarvestRequest, HarvestSummary, Harvester};
pub use rasterizer::rasterize_polygon;
