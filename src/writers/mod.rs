pub mod dataset_reader;
pub mod dataset_writer;

pub use dataset_reader::{DatasetReader, StoreInfo};
pub use dataset_writer::{average_over_coordinates, CommitSummary, DatasetWriter, StagedArrays};
