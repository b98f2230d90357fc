//! Harvests metocean hindcast time series (wind or solar variables) for a set
//! of coordinates and stores them as named arrays in a Parquet file.
//!
//! The pipeline runs in stages:
//!
//! 1. [`processors::rasterize_polygon`] optionally expands four corners into
//!    every whole-degree point they enclose.
//! 2. [`client::UrlBuilder`] turns coordinates into request URLs.
//! 3. [`client::BatchFetcher`] issues the requests in rate-limited waves.
//! 4. [`processors::ResponseAggregator`] collects the responses into
//!    per-variable `(coordinate, time step)` tensors.
//! 5. [`processors::derive`] adds derived solar quantities.
//! 6. [`writers::DatasetWriter`] commits the arrays to the store.
//!
//! [`processors::Harvester`] wires these together.

pub mod analyzers;
pub mod cli;
pub mod client;
pub mod error;
pub mod models;
pub mod processors;
pub mod utils;
pub mod writers;

pub use error::{HarvestError, Result};
