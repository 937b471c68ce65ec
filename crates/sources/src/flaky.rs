//! Fault injection and call counting wrappers.
//!
//! These wrap a real source and make it fail in a controlled way, tagging
//! every failure with an [`UpstreamFailure`] so the classifier can tell
//! network-like failures from service failures. They also count calls, which
//! is how retry and repeat bounds are observed.

use crate::traits::{MovieInfoSource, ReviewSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use domain::{MovieInfo, MovieInfoId, Review, UpstreamFailure};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Network,
    Service,
}

impl FailureMode {
    fn failure(self, message: &str) -> UpstreamFailure {
        match self {
            Self::Network => UpstreamFailure::Network(message.to_string()),
            Self::Service => UpstreamFailure::Service(message.to_string()),
        }
    }
}

/// When to inject a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePlan {
    /// No call fails; the wrapper only counts.
    Never,
    /// Every call fails.
    Always,
    /// The first `n` calls (per movie) fail, later calls go through.
    FirstCalls(u32),
}

impl FailurePlan {
    fn fails_on(self, call: u32) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::FirstCalls(n) => call <= n,
        }
    }
}

const REVIEW_FAILURE_MESSAGE: &str = "Exception occurred in Review Service";

/// Review source that fails according to a plan and counts calls per movie.
pub struct FlakyReviewSource {
    inner: Arc<dyn ReviewSource>,
    mode: FailureMode,
    plan: FailurePlan,
    /// Only this movie fails when set; every movie fails otherwise
    target: Option<MovieInfoId>,
    calls: Mutex<HashMap<MovieInfoId, u32>>,
}

impl FlakyReviewSource {
    pub fn new(inner: Arc<dyn ReviewSource>, mode: FailureMode, plan: FailurePlan) -> Self {
        Self {
            inner,
            mode,
            plan,
            target: None,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Pass every call through, only counting.
    pub fn counting(inner: Arc<dyn ReviewSource>) -> Self {
        Self::new(inner, FailureMode::Network, FailurePlan::Never)
    }

    /// Restrict failures to a single movie
    pub fn only_for(mut self, movie_info_id: MovieInfoId) -> Self {
        self.target = Some(movie_info_id);
        self
    }

    /// Number of `list_reviews` calls made for one movie.
    pub fn calls_for(&self, movie_info_id: MovieInfoId) -> u32 {
        self.lock_calls()
            .get(&movie_info_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of `list_reviews` calls across all movies.
    pub fn total_calls(&self) -> u32 {
        self.lock_calls().values().sum()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, HashMap<MovieInfoId, u32>> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_call(&self, movie_info_id: MovieInfoId) -> u32 {
        let mut calls = self.lock_calls();
        let count = calls.entry(movie_info_id).or_insert(0);
        *count += 1;
        *count
    }
}

#[async_trait]
impl ReviewSource for FlakyReviewSource {
    async fn list_reviews(&self, movie_info_id: MovieInfoId) -> Result<Vec<Review>> {
        let call = self.record_call(movie_info_id);
        let targeted = self.target.is_none_or(|target| target == movie_info_id);

        if targeted && self.plan.fails_on(call) {
            debug!(movie_info_id, call, mode = ?self.mode, "Injecting review failure");
            return Err(self.mode.failure(REVIEW_FAILURE_MESSAGE))
                .with_context(|| format!("fetching reviews for movie {}", movie_info_id));
        }

        self.inner.list_reviews(movie_info_id).await
    }
}

/// Movie info source that always fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingMovieInfoSource {
    mode: FailureMode,
}

impl FailingMovieInfoSource {
    pub fn new(mode: FailureMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl MovieInfoSource for FailingMovieInfoSource {
    async fn list_movie_infos(&self) -> Result<Vec<MovieInfo>> {
        Err(self.mode.failure("Exception occurred in Movie Info Service"))
            .context("fetching movie infos")
    }
}

/// Counts calls made to an inner movie info source.
pub struct CountingMovieInfoSource {
    inner: Arc<dyn MovieInfoSource>,
    list_calls: AtomicU32,
}

impl CountingMovieInfoSource {
    pub fn new(inner: Arc<dyn MovieInfoSource>) -> Self {
        Self {
            inner,
            list_calls: AtomicU32::new(0),
        }
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MovieInfoSource for CountingMovieInfoSource {
    async fn list_movie_infos(&self) -> Result<Vec<MovieInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_movie_infos().await
    }

    async fn movie_info(&self, movie_info_id: MovieInfoId) -> Result<Option<MovieInfo>> {
        self.inner.movie_info(movie_info_id).await
    }
}
