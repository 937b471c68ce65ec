//! # Movie Aggregator
//!
//! This module joins movie infos with their reviews:
//! 1. Fetch every movie info
//! 2. Fetch the reviews of each movie (concurrently across movies)
//! 3. Join each pair into a `Movie` and emit it
//! 4. Optionally retry failed review fetches and repeat the whole cycle
//!
//! ## Failure semantics
//!
//! Results are streams of `Result<Movie, MovieError>`. Movies are emitted as
//! soon as their join completes. When a join fails, the sibling joins still
//! run to completion and their movies are still emitted; the first failure
//! is then yielded as the last item and the stream ends. Later failures from
//! the same cycle are logged and dropped.
//!
//! Streams are lazy and pull-based: nothing is fetched unless the stream is
//! polled, and dropping it cancels in-flight joins and prevents any further
//! cycle from starting.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tracing::{debug, error, info, warn};

use domain::{Movie, MovieError, MovieInfo, MovieInfoId, Review};
use pipeline::{RepeatPolicy, RetryPolicy, classify};
use sources::{MovieInfoSource, RevenueSource, ReviewSource};

/// Stream of joined movies produced by the aggregator.
pub type MovieStream = BoxStream<'static, Result<Movie, MovieError>>;

/// How the per-movie joins of one cycle are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Run up to `limit` joins at once (`None` = all of them). Movies come
    /// out in completion order.
    Concurrent(Option<usize>),
    /// One join at a time; movies come out in source order.
    Sequential,
}

impl Default for JoinStrategy {
    fn default() -> Self {
        Self::Concurrent(None)
    }
}

/// What to do when a review fetch fails.
#[derive(Debug, Clone)]
enum ReviewFetch {
    /// Classify and surface the failure
    Once,
    /// Hand the fetch to a retry policy
    Retry(RetryPolicy),
    /// Log the failure and join with no reviews
    Lenient,
}

/// Joins movie infos with reviews from two independent sources.
#[derive(Clone)]
pub struct MovieAggregator {
    movie_infos: Arc<dyn MovieInfoSource>,
    reviews: Arc<dyn ReviewSource>,
    revenue: Option<Arc<dyn RevenueSource>>,
    join_strategy: JoinStrategy,
}

impl MovieAggregator {
    /// Create an aggregator over a movie info source and a review source.
    pub fn new(movie_infos: Arc<dyn MovieInfoSource>, reviews: Arc<dyn ReviewSource>) -> Self {
        Self {
            movie_infos,
            reviews,
            revenue: None,
            join_strategy: JoinStrategy::default(),
        }
    }

    /// Enable `fetch_one_with_revenue`
    pub fn with_revenue_source(mut self, revenue: Arc<dyn RevenueSource>) -> Self {
        self.revenue = Some(revenue);
        self
    }

    /// Configure how joins are scheduled (default: all concurrently)
    pub fn with_join_strategy(mut self, join_strategy: JoinStrategy) -> Self {
        self.join_strategy = join_strategy;
        self
    }

    // =========================================================================
    // Whole-catalogue operations
    // =========================================================================

    /// One cycle, no retry.
    pub fn movies(&self) -> MovieStream {
        self.cycle(ReviewFetch::Once)
    }

    /// One cycle, no retry, collected.
    pub async fn fetch_all(&self) -> Result<Vec<Movie>, MovieError> {
        collect_cycle(self.movies()).await
    }

    /// One cycle with every review fetch retried under `policy`.
    pub fn movies_with_retry(&self, policy: RetryPolicy) -> MovieStream {
        self.cycle(ReviewFetch::Retry(policy))
    }

    /// One cycle with retries, collected.
    pub async fn fetch_all_with_retry(&self, policy: RetryPolicy) -> Result<Vec<Movie>, MovieError> {
        collect_cycle(self.movies_with_retry(policy)).await
    }

    /// One cycle where a failed review fetch yields a movie without reviews.
    ///
    /// A failure to load the movie infos still ends the stream with an error.
    pub fn movies_lenient(&self) -> MovieStream {
        self.cycle(ReviewFetch::Lenient)
    }

    /// Lenient cycle, collected.
    pub async fn fetch_all_lenient(&self) -> Result<Vec<Movie>, MovieError> {
        collect_cycle(self.movies_lenient()).await
    }

    /// Retrying cycles, repeated according to `repeat`.
    ///
    /// A new cycle only starts after the previous one finished without an
    /// error. With [`RepeatPolicy::forever`] the stream never ends on its
    /// own; drop it (or use `take`/`take_until`) to stop.
    ///
    /// An empty cycle counts like any other unless the repeat policy was
    /// built with `with_stop_on_empty(true)`.
    pub fn movies_with_retry_and_repeat(
        &self,
        retry: RetryPolicy,
        repeat: RepeatPolicy,
    ) -> MovieStream {
        let state = RepeatState {
            aggregator: self.clone(),
            retry,
            repeat,
            completed: 0,
            emitted_in_cycle: 0,
            current: None,
            finished: false,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if state.finished {
                    return None;
                }

                let mut cycle = match state.current.take() {
                    Some(cycle) => cycle,
                    None => {
                        if state.completed > 0 {
                            if !state
                                .repeat
                                .should_repeat_after(state.completed, state.emitted_in_cycle)
                            {
                                info!(
                                    cycles = state.completed,
                                    movies = state.emitted_in_cycle,
                                    "Not repeating"
                                );
                                return None;
                            }
                            tokio::task::yield_now().await;
                        }
                        info!(cycle = state.completed + 1, "Starting aggregation cycle");
                        state.emitted_in_cycle = 0;
                        state.aggregator.movies_with_retry(state.retry.clone())
                    }
                };

                match cycle.next().await {
                    Some(Ok(movie)) => {
                        state.emitted_in_cycle += 1;
                        state.current = Some(cycle);
                        return Some((Ok(movie), state));
                    }
                    Some(Err(err)) => {
                        warn!(cycle = state.completed + 1, error = %err, "Cycle failed, not repeating");
                        state.finished = true;
                        return Some((Err(err), state));
                    }
                    None => {
                        state.completed += 1;
                        debug!(
                            cycle = state.completed,
                            movies = state.emitted_in_cycle,
                            "Aggregation cycle complete"
                        );
                    }
                }
            }
        })
        .boxed()
    }

    // =========================================================================
    // Single-movie operations
    // =========================================================================

    /// One movie info joined with its reviews, no retry.
    ///
    /// The info and the reviews are fetched concurrently.
    pub async fn fetch_one(&self, movie_info_id: MovieInfoId) -> Result<Movie, MovieError> {
        let (info, reviews) = tokio::join!(
            self.movie_infos.movie_info(movie_info_id),
            self.reviews.list_reviews(movie_info_id)
        );

        let info = require_info(movie_info_id, info.map_err(|err| classify(&err))?)?;
        let reviews = reviews.map_err(|err| classify(&err))?;

        Ok(Movie::new(info, reviews))
    }

    /// Like [`fetch_one`](Self::fetch_one), also attaching revenue.
    ///
    /// Fails with a permanent error when no revenue source is configured.
    pub async fn fetch_one_with_revenue(
        &self,
        movie_info_id: MovieInfoId,
    ) -> Result<Movie, MovieError> {
        let revenue_source = self
            .revenue
            .as_ref()
            .ok_or_else(|| MovieError::permanent("no revenue source configured"))?;

        let (info, reviews, revenue) = tokio::join!(
            self.movie_infos.movie_info(movie_info_id),
            self.reviews.list_reviews(movie_info_id),
            revenue_source.revenue(movie_info_id)
        );

        let info = require_info(movie_info_id, info.map_err(|err| classify(&err))?)?;
        let reviews = reviews.map_err(|err| classify(&err))?;
        let revenue = revenue.map_err(|err| classify(&err))?;

        Ok(Movie::new(info, reviews).with_revenue(revenue))
    }

    // =========================================================================
    // Cycle internals
    // =========================================================================

    /// Build one aggregation cycle. Nothing runs until the stream is polled.
    fn cycle(&self, review_fetch: ReviewFetch) -> MovieStream {
        let this = self.clone();

        stream::once(async move {
            match this.load_movie_infos().await {
                Ok(infos) => this.join_all(infos, review_fetch),
                Err(err) => stream::iter([Err(err)]).boxed(),
            }
        })
        .flatten()
        .boxed()
    }

    async fn load_movie_infos(&self) -> Result<Vec<MovieInfo>, MovieError> {
        match self.movie_infos.list_movie_infos().await {
            Ok(infos) => {
                info!(count = infos.len(), "Loaded movie infos");
                Ok(infos)
            }
            Err(err) => {
                let err = classify(&err);
                error!(error = %err, "Failed to load movie infos");
                Err(err)
            }
        }
    }

    fn join_all(&self, infos: Vec<MovieInfo>, review_fetch: ReviewFetch) -> MovieStream {
        let this = self.clone();
        let count = infos.len();

        let joins = stream::iter(infos).map(move |info| {
            let this = this.clone();
            let review_fetch = review_fetch.clone();
            async move { this.join(info, &review_fetch).await }
        });

        let joined = match self.join_strategy {
            JoinStrategy::Sequential => joins.buffered(1).boxed(),
            JoinStrategy::Concurrent(limit) => {
                let limit = limit.unwrap_or(count).max(1);
                joins.buffer_unordered(limit).boxed()
            }
        };

        defer_first_error(joined)
    }

    /// Fetch the reviews for one movie and join them with its info.
    async fn join(&self, info: MovieInfo, review_fetch: &ReviewFetch) -> Result<Movie, MovieError> {
        let movie_info_id = info.movie_info_id;
        let reviews = self.fetch_reviews(movie_info_id, review_fetch).await?;

        debug!(movie_info_id, reviews = reviews.len(), "Joined movie");
        Ok(Movie::new(info, reviews))
    }

    async fn fetch_reviews(
        &self,
        movie_info_id: MovieInfoId,
        review_fetch: &ReviewFetch,
    ) -> Result<Vec<Review>, MovieError> {
        match review_fetch {
            ReviewFetch::Once => self
                .reviews
                .list_reviews(movie_info_id)
                .await
                .map_err(|err| classify(&err)),
            ReviewFetch::Retry(policy) => {
                let label = format!("reviews for movie {}", movie_info_id);
                policy
                    .run(&label, || self.reviews.list_reviews(movie_info_id))
                    .await
            }
            ReviewFetch::Lenient => match self.reviews.list_reviews(movie_info_id).await {
                Ok(reviews) => Ok(reviews),
                Err(err) => {
                    let error = format!("{:#}", err);
                    warn!(movie_info_id, error = %error, "Review fetch failed, joining without reviews");
                    Ok(Vec::new())
                }
            },
        }
    }
}

struct RepeatState {
    aggregator: MovieAggregator,
    retry: RetryPolicy,
    repeat: RepeatPolicy,
    completed: u64,
    emitted_in_cycle: u64,
    current: Option<MovieStream>,
    finished: bool,
}

fn require_info(
    movie_info_id: MovieInfoId,
    info: Option<MovieInfo>,
) -> Result<MovieInfo, MovieError> {
    info.ok_or_else(|| MovieError::permanent(format!("movie info {} not found", movie_info_id)))
}

/// Pass successes straight through, hold back the first error until `inner`
/// is drained, then yield it and stop.
fn defer_first_error(inner: MovieStream) -> MovieStream {
    stream::unfold(
        (inner, None::<MovieError>, false),
        |(mut inner, mut failure, finished)| async move {
            if finished {
                return None;
            }
            while let Some(item) = inner.next().await {
                match item {
                    Ok(movie) => return Some((Ok(movie), (inner, failure, false))),
                    Err(err) if failure.is_none() => failure = Some(err),
                    Err(err) => warn!(error = %err, "Dropping further failure from the same cycle"),
                }
            }
            failure.map(|err| (Err(err), (inner, None, true)))
        },
    )
    .boxed()
}

async fn collect_cycle(movies: MovieStream) -> Result<Vec<Movie>, MovieError> {
    let start = Instant::now();
    let movies: Vec<Movie> = movies.try_collect().await?;
    info!(
        count = movies.len(),
        elapsed = ?start.elapsed(),
        "Aggregated movies"
    );
    Ok(movies)
}
