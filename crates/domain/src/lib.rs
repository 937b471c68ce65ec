//! # Domain Crate
//!
//! Values and errors shared by the movie aggregation workspace.
//!
//! ## Main Components
//!
//! - **types**: MovieInfo, Review, Revenue and the joined Movie
//! - **error**: the upstream failure tag and the classified MovieError
//!
//! ## Example Usage
//!
//! ```ignore
//! use domain::{Movie, MovieInfo, Review};
//!
//! let info = MovieInfo::new(1, "Batman Begins", 2005, vec!["Christian Bale".into()]);
//! let reviews = vec![Review::new(1, 1, "Awesome Movie", 8.9)];
//!
//! let movie = Movie::new(info, reviews);
//! println!("{} has {} reviews", movie.name(), movie.reviews().len());
//! ```

// Public modules
pub mod error;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{MovieError, Result, UpstreamFailure};
pub use types::{Movie, MovieInfo, MovieInfoId, Revenue, Review, ReviewId};
