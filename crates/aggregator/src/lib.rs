//! Aggregator crate for the movie aggregation workspace.
//!
//! This crate contains the aggregator that joins movie infos with their
//! reviews and applies the retry and repeat policies from `pipeline`.

pub mod aggregator;

pub use aggregator::{JoinStrategy, MovieAggregator, MovieStream};
