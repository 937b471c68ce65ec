//! Fault-handling policies for the aggregation pipeline.
//!
//! This crate provides:
//! - `classify` to turn a raw source failure into a `MovieError`
//! - `RetryPolicy` for bounded exponential-backoff retries of one fetch
//! - `RepeatPolicy` for re-running a whole successful aggregation cycle
//!
//! ## Architecture
//! A failing fetch goes through the stages in order:
//! 1. The source returns an `anyhow::Error` tagged with an `UpstreamFailure`
//! 2. `classify` maps it to `Transient` or `Permanent`
//! 3. `RetryPolicy::run` retries transient failures with backoff and wraps
//!    the final one in `Exhausted`
//! 4. The aggregator hands the `MovieError` to the consumer, and
//!    `RepeatPolicy` only starts a new cycle after a clean one
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{RepeatPolicy, RetryPolicy};
//! use std::time::Duration;
//!
//! let retry = RetryPolicy::new(3, Duration::from_millis(500))
//!     .with_max_delay(Duration::from_secs(5));
//!
//! let reviews = retry
//!     .run("reviews for movie 1", || review_source.list_reviews(1))
//!     .await?;
//!
//! let repeat = RepeatPolicy::times(2);
//! assert_eq!(repeat.total_cycles(), Some(3));
//! ```

pub mod classifier;
pub mod retry;
pub mod repeat;

// Re-export main types
pub use classifier::classify;
pub use retry::{RetryOn, RetryPolicy};
pub use repeat::RepeatPolicy;
