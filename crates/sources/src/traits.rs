//! Collaborator traits the aggregator fetches from.
//!
//! Implementations may be backed by anything (HTTP, files, fixtures). The
//! aggregator only relies on these methods, and on failures carrying an
//! [`UpstreamFailure`](domain::UpstreamFailure) somewhere in their error
//! chain when they want to be classified as retryable.

use anyhow::Result;
use async_trait::async_trait;
use domain::{MovieInfo, MovieInfoId, Revenue, Review};

/// Supplies the base movie records.
///
/// ## Design Note
/// - `Send + Sync` so one source can be shared behind an `Arc` by every
///   concurrent join
/// - Implementations must be safe to call again with the same arguments;
///   retries and repeats depend on it
#[async_trait]
pub trait MovieInfoSource: Send + Sync {
    /// Fetch every movie info.
    async fn list_movie_infos(&self) -> Result<Vec<MovieInfo>>;

    /// Fetch a single movie info, `Ok(None)` if it does not exist.
    ///
    /// The default scans [`list_movie_infos`](Self::list_movie_infos);
    /// sources with keyed access should override it.
    async fn movie_info(&self, movie_info_id: MovieInfoId) -> Result<Option<MovieInfo>> {
        let infos = self.list_movie_infos().await?;
        Ok(infos
            .into_iter()
            .find(|info| info.movie_info_id == movie_info_id))
    }
}

/// Supplies the reviews for one movie.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetch the reviews whose `movie_info_id` is the given key.
    async fn list_reviews(&self, movie_info_id: MovieInfoId) -> Result<Vec<Review>>;
}

/// Supplies revenue figures for one movie.
#[async_trait]
pub trait RevenueSource: Send + Sync {
    async fn revenue(&self, movie_info_id: MovieInfoId) -> Result<Revenue>;
}
