//! # Sources Crate
//!
//! This crate defines the upstream collaborators the aggregator fetches from,
//! plus in-memory implementations used by the demo binary and the tests.
//!
//! ## Components
//!
//! ### Traits
//! - `MovieInfoSource`: lists base movie records
//! - `ReviewSource`: lists the reviews of one movie
//! - `RevenueSource`: budget and box office of one movie
//!
//! ### In-memory fixtures
//! Fixture data is passed in at construction, never read from globals:
//! - `InMemoryMovieInfoSource::batman_trilogy()`
//! - `InMemoryReviewSource::two_per_movie(&ids)`
//! - `InMemoryRevenueSource::flat(budget, box_office)`
//!
//! ### Fault injection
//! - `FlakyReviewSource` fails with a network or service tag, always or for
//!   the first N calls per movie, and counts calls per movie
//! - `FailingMovieInfoSource` always fails
//! - `CountingMovieInfoSource` counts list calls
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{FailureMode, FailurePlan, FlakyReviewSource, InMemoryReviewSource};
//! use std::sync::Arc;
//!
//! let reviews = Arc::new(InMemoryReviewSource::two_per_movie(&[1, 2, 3]));
//! let flaky = FlakyReviewSource::new(reviews, FailureMode::Network, FailurePlan::FirstCalls(2))
//!     .only_for(1);
//!
//! assert!(flaky.list_reviews(1).await.is_err());
//! assert_eq!(flaky.calls_for(1), 1);
//! ```

// Public modules
pub mod traits;
pub mod in_memory;
pub mod flaky;

// Re-export commonly used types
pub use traits::{MovieInfoSource, RevenueSource, ReviewSource};
pub use in_memory::{InMemoryMovieInfoSource, InMemoryRevenueSource, InMemoryReviewSource};
pub use flaky::{
    CountingMovieInfoSource, FailingMovieInfoSource, FailureMode, FailurePlan, FlakyReviewSource,
};
