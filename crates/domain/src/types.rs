//! Core domain types for movie aggregation.
//!
//! This module defines the values that flow through the aggregation pipeline.
//! Key Rust concepts demonstrated here:
//! - Type aliases for domain clarity (MovieInfoId, ReviewId)
//! - Structs with public fields for plain values
//! - Private fields + a constructor to enforce an invariant (Movie)
//! - Consuming builder-style methods that return new values

use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a movie info record
pub type MovieInfoId = u64;

/// Unique identifier for a review
pub type ReviewId = u64;

// =============================================================================
// Upstream Records
// =============================================================================

/// Base record describing a movie, as returned by a movie info source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieInfo {
    pub movie_info_id: MovieInfoId,
    pub name: String,
    /// Release year
    pub year: u16,
    /// Cast in billing order
    pub cast: Vec<String>,
}

impl MovieInfo {
    pub fn new(
        movie_info_id: MovieInfoId,
        name: impl Into<String>,
        year: u16,
        cast: Vec<String>,
    ) -> Self {
        Self {
            movie_info_id,
            name: name.into(),
            year,
            cast,
        }
    }
}

/// A review attached to a movie through `movie_info_id`.
///
/// `movie_info_id` is a foreign key, not an ownership pointer: reviews are
/// fetched independently and joined by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: ReviewId,
    pub movie_info_id: MovieInfoId,
    pub comment: String,
    pub rating: f64,
}

impl Review {
    pub fn new(
        review_id: ReviewId,
        movie_info_id: MovieInfoId,
        comment: impl Into<String>,
        rating: f64,
    ) -> Self {
        Self {
            review_id,
            movie_info_id,
            comment: comment.into(),
            rating,
        }
    }
}

/// Financial figures for a movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revenue {
    pub movie_info_id: MovieInfoId,
    pub budget: u64,
    pub box_office: u64,
}

// =============================================================================
// Movie - the joined value
// =============================================================================

/// A movie info joined with its reviews (and optionally its revenue).
///
/// Rust concept: the fields are private so the only way to build a `Movie`
/// is through [`Movie::new`], which guarantees that every review belongs to
/// this movie. Nothing hands out `&mut` access, so a `Movie` never changes
/// after it is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Movie {
    info: MovieInfo,
    reviews: Vec<Review>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revenue: Option<Revenue>,
}

impl Movie {
    /// Join an info with its reviews.
    ///
    /// Reviews whose `movie_info_id` does not match the info are dropped.
    pub fn new(info: MovieInfo, reviews: Vec<Review>) -> Self {
        let fetched = reviews.len();
        let reviews: Vec<Review> = reviews
            .into_iter()
            .filter(|review| review.movie_info_id == info.movie_info_id)
            .collect();

        if reviews.len() != fetched {
            debug!(
                movie_info_id = info.movie_info_id,
                dropped = fetched - reviews.len(),
                "Dropped reviews belonging to another movie"
            );
        }

        Self {
            info,
            reviews,
            revenue: None,
        }
    }

    /// Attach revenue figures, returning a new movie.
    ///
    /// Revenue for a different movie is ignored.
    pub fn with_revenue(self, revenue: Revenue) -> Self {
        if revenue.movie_info_id != self.info.movie_info_id {
            debug!(
                movie_info_id = self.info.movie_info_id,
                revenue_for = revenue.movie_info_id,
                "Ignoring revenue belonging to another movie"
            );
            return self;
        }
        Self {
            revenue: Some(revenue),
            ..self
        }
    }

    pub fn id(&self) -> MovieInfoId {
        self.info.movie_info_id
    }

    pub fn info(&self) -> &MovieInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn revenue(&self) -> Option<&Revenue> {
        self.revenue.as_ref()
    }

    /// Average review rating, or `None` when the movie has no reviews.
    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let total: f64 = self.reviews.iter().map(|r| r.rating).sum();
        Some(total / self.reviews.len() as f64)
    }
}
