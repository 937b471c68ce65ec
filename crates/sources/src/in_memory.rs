//! In-memory sources backed by fixture data.
//!
//! The fixture data is handed to each source when it is built, so two
//! aggregators never share hidden global state. An optional latency
//! simulates the upstream call with a tokio sleep.

use crate::traits::{MovieInfoSource, RevenueSource, ReviewSource};
use anyhow::Result;
use async_trait::async_trait;
use domain::{MovieInfo, MovieInfoId, Revenue, Review, ReviewId};
use std::time::Duration;
use tracing::debug;

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

// =============================================================================
// Movie infos
// =============================================================================

/// Serves a fixed list of movie infos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMovieInfoSource {
    infos: Vec<MovieInfo>,
    latency: Duration,
}

impl InMemoryMovieInfoSource {
    pub fn new(infos: Vec<MovieInfo>) -> Self {
        Self {
            infos,
            latency: Duration::ZERO,
        }
    }

    /// The three Nolan Batman films, ids 1 to 3.
    pub fn batman_trilogy() -> Self {
        Self::new(vec![
            MovieInfo::new(
                1,
                "Batman Begins",
                2005,
                vec!["Christian Bale".to_string(), "Michael Caine".to_string()],
            ),
            MovieInfo::new(
                2,
                "The Dark Knight",
                2008,
                vec!["Christian Bale".to_string(), "Heath Ledger".to_string()],
            ),
            MovieInfo::new(
                3,
                "Dark Knight Rises",
                2012,
                vec!["Christian Bale".to_string(), "Tom Hardy".to_string()],
            ),
        ])
    }

    /// Simulate an upstream round trip on every call (default: none)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn ids(&self) -> Vec<MovieInfoId> {
        self.infos.iter().map(|info| info.movie_info_id).collect()
    }
}

#[async_trait]
impl MovieInfoSource for InMemoryMovieInfoSource {
    async fn list_movie_infos(&self) -> Result<Vec<MovieInfo>> {
        simulate_latency(self.latency).await;
        debug!(count = self.infos.len(), "Serving movie infos");
        Ok(self.infos.clone())
    }

    async fn movie_info(&self, movie_info_id: MovieInfoId) -> Result<Option<MovieInfo>> {
        simulate_latency(self.latency).await;
        Ok(self
            .infos
            .iter()
            .find(|info| info.movie_info_id == movie_info_id)
            .cloned())
    }
}

// =============================================================================
// Reviews
// =============================================================================

/// Serves reviews from a fixed list, filtered by owning movie.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReviewSource {
    reviews: Vec<Review>,
    latency: Duration,
}

impl InMemoryReviewSource {
    pub fn new(reviews: Vec<Review>) -> Self {
        Self {
            reviews,
            latency: Duration::ZERO,
        }
    }

    /// Two reviews ("Awesome Movie" 8.9, "Excellent Movie" 9.0) for each id.
    pub fn two_per_movie(movie_info_ids: &[MovieInfoId]) -> Self {
        let mut next_id: ReviewId = 1;
        let mut reviews = Vec::with_capacity(movie_info_ids.len() * 2);
        for &movie_info_id in movie_info_ids {
            for (comment, rating) in [("Awesome Movie", 8.9), ("Excellent Movie", 9.0)] {
                reviews.push(Review::new(next_id, movie_info_id, comment, rating));
                next_id += 1;
            }
        }
        Self::new(reviews)
    }

    /// Simulate an upstream round trip on every call (default: none)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ReviewSource for InMemoryReviewSource {
    async fn list_reviews(&self, movie_info_id: MovieInfoId) -> Result<Vec<Review>> {
        simulate_latency(self.latency).await;
        let reviews: Vec<Review> = self
            .reviews
            .iter()
            .filter(|review| review.movie_info_id == movie_info_id)
            .cloned()
            .collect();
        debug!(movie_info_id, count = reviews.len(), "Serving reviews");
        Ok(reviews)
    }
}

// =============================================================================
// Revenue
// =============================================================================

/// Reports the same budget and box office for every movie.
#[derive(Debug, Clone)]
pub struct InMemoryRevenueSource {
    budget: u64,
    box_office: u64,
    latency: Duration,
}

impl InMemoryRevenueSource {
    pub fn flat(budget: u64, box_office: u64) -> Self {
        Self {
            budget,
            box_office,
            latency: Duration::ZERO,
        }
    }

    /// Simulate an upstream round trip on every call (default: none)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl RevenueSource for InMemoryRevenueSource {
    async fn revenue(&self, movie_info_id: MovieInfoId) -> Result<Revenue> {
        simulate_latency(self.latency).await;
        Ok(Revenue {
            movie_info_id,
            budget: self.budget,
            box_office: self.box_office,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trilogy_lists_three_movies() {
        let source = InMemoryMovieInfoSource::batman_trilogy();

        let infos = source.list_movie_infos().await.unwrap();

        assert_eq!(infos.len(), 3);
        assert_eq!(infos[0].name, "Batman Begins");
        assert_eq!(source.ids(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_movie_info_lookup() {
        let source = InMemoryMovieInfoSource::batman_trilogy();

        let found = source.movie_info(2).await.unwrap();
        assert_eq!(found.map(|info| info.name), Some("The Dark Knight".to_string()));

        assert!(source.movie_info(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reviews_filtered_by_movie() {
        let source = InMemoryReviewSource::two_per_movie(&[1, 2]);

        let reviews = source.list_reviews(2).await.unwrap();

        assert_eq!(reviews.len(), 2);
        assert!(reviews.iter().all(|r| r.movie_info_id == 2));
        assert!(source.list_reviews(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_ids_are_unique() {
        let source = InMemoryReviewSource::two_per_movie(&[1, 2, 3]);

        let mut ids = Vec::new();
        for movie_info_id in 1..=3 {
            for review in source.list_reviews(movie_info_id).await.unwrap() {
                ids.push(review.review_id);
            }
        }
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_simulated() {
        let source = InMemoryMovieInfoSource::batman_trilogy()
            .with_latency(Duration::from_millis(250));

        let start = tokio::time::Instant::now();
        source.list_movie_infos().await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_flat_revenue() {
        let source = InMemoryRevenueSource::flat(1_000_000, 5_000_000);

        let revenue = source.revenue(7).await.unwrap();

        assert_eq!(revenue.movie_info_id, 7);
        assert_eq!(revenue.budget, 1_000_000);
        assert_eq!(revenue.box_office, 5_000_000);
    }
}
