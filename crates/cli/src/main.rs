use aggregator::{JoinStrategy, MovieAggregator};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use domain::{Movie, MovieInfoId};
use futures::StreamExt;
use pipeline::{RepeatPolicy, RetryPolicy};
use sources::{
    FailureMode, FailurePlan, FlakyReviewSource, InMemoryMovieInfoSource, InMemoryRevenueSource,
    InMemoryReviewSource, ReviewSource,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// movie-agg - Movie info and review aggregator
#[derive(Parser)]
#[command(name = "movie-agg")]
#[command(about = "Joins movie infos with their reviews, with retry and repeat policies", long_about = None)]
struct Cli {
    /// Simulated latency of every upstream call, in milliseconds
    #[arg(long, default_value = "0", global = true)]
    latency_ms: u64,

    /// Print movies as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate every movie, optionally repeating the whole cycle
    Aggregate {
        #[command(flatten)]
        retry: RetryArgs,

        #[command(flatten)]
        faults: FaultArgs,

        /// Extra cycles to run after the first successful one
        #[arg(long, default_value = "0", conflicts_with = "forever")]
        repeat: u64,

        /// Repeat until interrupted with Ctrl-C
        #[arg(long)]
        forever: bool,

        /// Join movies one at a time instead of concurrently
        #[arg(long)]
        sequential: bool,

        /// Maximum number of movies joined at once
        #[arg(long, conflicts_with = "sequential")]
        concurrency: Option<usize>,
    },

    /// Fetch a single movie by id
    Movie {
        /// Movie info id to fetch
        #[arg(long)]
        id: MovieInfoId,

        /// Also join revenue figures
        #[arg(long)]
        revenue: bool,

        #[command(flatten)]
        faults: FaultArgs,
    },
}

#[derive(Args)]
struct RetryArgs {
    /// Retries per review fetch after the first attempt
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Delay before the first retry, doubled on every later one
    #[arg(long, default_value = "500")]
    base_delay_ms: u64,

    /// Upper bound on a single retry delay
    #[arg(long)]
    max_delay_ms: Option<u64>,
}

impl RetryArgs {
    fn policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.max_retries, Duration::from_millis(self.base_delay_ms));
        match self.max_delay_ms {
            Some(max_delay_ms) => policy.with_max_delay(Duration::from_millis(max_delay_ms)),
            None => policy,
        }
    }
}

#[derive(Args)]
struct FaultArgs {
    /// Inject review failures of this kind
    #[arg(long, value_enum)]
    fail_reviews: Option<FaultKind>,

    /// Only fail reviews for this movie
    #[arg(long, requires = "fail_reviews")]
    fail_key: Option<MovieInfoId>,

    /// Fail only the first N calls per movie (default: every call)
    #[arg(long, requires = "fail_reviews")]
    fail_times: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FaultKind {
    Network,
    Service,
}

impl From<FaultKind> for FailureMode {
    fn from(kind: FaultKind) -> Self {
        match kind {
            FaultKind::Network => FailureMode::Network,
            FaultKind::Service => FailureMode::Service,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let latency = Duration::from_millis(cli.latency_ms);

    match cli.command {
        Commands::Aggregate {
            retry,
            faults,
            repeat,
            forever,
            sequential,
            concurrency,
        } => {
            let join_strategy = if sequential {
                JoinStrategy::Sequential
            } else {
                JoinStrategy::Concurrent(concurrency)
            };
            let repeat = if forever {
                RepeatPolicy::forever()
            } else {
                RepeatPolicy::times(repeat)
            };
            let aggregator =
                build_aggregator(latency, &faults).with_join_strategy(join_strategy);
            handle_aggregate(aggregator, retry.policy(), repeat, cli.json).await?
        }
        Commands::Movie {
            id,
            revenue,
            faults,
        } => {
            let aggregator = build_aggregator(latency, &faults);
            handle_movie(aggregator, latency, id, revenue, cli.json).await?
        }
    }

    Ok(())
}

/// Wire the fixture sources, wrapping reviews in a fault injector when asked.
fn build_aggregator(latency: Duration, faults: &FaultArgs) -> MovieAggregator {
    let movie_infos = InMemoryMovieInfoSource::batman_trilogy().with_latency(latency);
    let reviews: Arc<dyn ReviewSource> =
        Arc::new(InMemoryReviewSource::two_per_movie(&movie_infos.ids()).with_latency(latency));

    let reviews: Arc<dyn ReviewSource> = match faults.fail_reviews {
        Some(kind) => {
            let plan = faults
                .fail_times
                .map(FailurePlan::FirstCalls)
                .unwrap_or(FailurePlan::Always);
            let flaky = FlakyReviewSource::new(reviews, kind.into(), plan);
            match faults.fail_key {
                Some(movie_info_id) => Arc::new(flaky.only_for(movie_info_id)),
                None => Arc::new(flaky),
            }
        }
        None => reviews,
    };

    MovieAggregator::new(Arc::new(movie_infos), reviews)
}

/// Handle the 'aggregate' command
async fn handle_aggregate(
    aggregator: MovieAggregator,
    retry: RetryPolicy,
    repeat: RepeatPolicy,
    json: bool,
) -> Result<()> {
    let start = Instant::now();
    let mut movies = aggregator.movies_with_retry_and_repeat(retry, repeat);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if !json {
        println!("{}", "Movies:".bold().blue());
    }

    let mut count = 0usize;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(movies = count, "Interrupted, stopping aggregation");
                break;
            }
            next = movies.next() => match next {
                Some(Ok(movie)) => {
                    count += 1;
                    print_movie(count, &movie, json)?;
                }
                Some(Err(err)) => {
                    return Err(err).with_context(|| format!("Aggregation failed after {} movies", count));
                }
                None => break,
            },
        }
    }

    if !json {
        println!(
            "{} Aggregated {} movies in {:?}",
            "✓".green(),
            count,
            start.elapsed()
        );
    }
    Ok(())
}

/// Handle the 'movie' command
async fn handle_movie(
    aggregator: MovieAggregator,
    latency: Duration,
    movie_info_id: MovieInfoId,
    with_revenue: bool,
    json: bool,
) -> Result<()> {
    let fetched = if with_revenue {
        let revenue = InMemoryRevenueSource::flat(150_000_000, 370_000_000).with_latency(latency);
        aggregator
            .with_revenue_source(Arc::new(revenue))
            .fetch_one_with_revenue(movie_info_id)
            .await
    } else {
        aggregator.fetch_one(movie_info_id).await
    };
    let movie = fetched.with_context(|| format!("Failed to fetch movie {}", movie_info_id))?;

    print_movie(1, &movie, json)
}

/// Print one movie, either as a JSON line or as a formatted entry
fn print_movie(rank: usize, movie: &Movie, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(movie).context("Failed to serialize movie")?;
        println!("{}", line);
        return Ok(());
    }

    let info = movie.info();
    let rating = movie
        .average_rating()
        .map(|avg| format!("{:.1}", avg))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "{}. {} ({}) - {} reviews, avg {}",
        rank.to_string().green(),
        info.name.bold(),
        info.year,
        movie.reviews().len(),
        rating
    );
    println!("   Cast: {}", info.cast.join(", "));
    for review in movie.reviews() {
        println!("   {} {} ({:.1})", "•".cyan(), review.comment, review.rating);
    }
    if let Some(revenue) = movie.revenue() {
        println!(
            "   Budget: ${}  Box office: ${}",
            revenue.budget, revenue.box_office
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sequential_conflicts_with_concurrency() {
        let result = Cli::try_parse_from([
            "movie-agg",
            "aggregate",
            "--sequential",
            "--concurrency",
            "2",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_concurrency_alone_is_accepted() {
        let cli = Cli::try_parse_from(["movie-agg", "aggregate", "--concurrency", "2"])
            .expect("parse failed");

        match cli.command {
            Commands::Aggregate {
                concurrency,
                sequential,
                ..
            } => {
                assert_eq!(concurrency, Some(2));
                assert!(!sequential);
            }
            Commands::Movie { .. } => panic!("expected the aggregate command"),
        }
    }

    #[test]
    fn test_repeat_conflicts_with_forever() {
        let result =
            Cli::try_parse_from(["movie-agg", "aggregate", "--repeat", "2", "--forever"]);

        assert!(result.is_err());
    }
}
