//! meeplegraph - BoardGameGeek data CLI.
#![allow(clippy::future_not_send)]

/// Application configuration (TOML).
mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, AppPaths};
use meeplegraph_api::bgg::{BggClient, CollectionOptions, Game, PlaysQuery};
use meeplegraph_db::ResponseCache;

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Show one game.
    Game(GameArgs),
    /// Show several games fetched in one request.
    Games(GamesArgs),
    /// Show a user profile.
    User(UserArgs),
    /// List a user's collection.
    Collection(CollectionArgs),
    /// Search board games by name.
    Search(SearchArgs),
    /// List a user's logged plays.
    Plays(PlaysArgs),
    /// Show a historical rank snapshot.
    Snapshot(SnapshotArgs),
    /// Response cache maintenance.
    Cache(CacheCommand),
}

/// Arguments for the `game` subcommand.
#[derive(clap::Args)]
struct GameArgs {
    /// BGG game id (e.g. 174430).
    #[arg(long, required = true)]
    id: u32,

    /// Number of ratings pages to fetch (100 ratings per page).
    #[arg(long, default_value_t = 0)]
    ratings_pages: u32,
}

/// Arguments for the `games` subcommand.
#[derive(clap::Args)]
struct GamesArgs {
    /// Comma-separated game ids (e.g. "13,822,174430").
    #[arg(long, required = true, value_delimiter = ',')]
    ids: Vec<u32>,
}

/// Arguments for the `user` subcommand.
#[derive(clap::Args)]
struct UserArgs {
    /// BGG username.
    #[arg(long, required = true)]
    name: String,
}

/// Arguments for the `collection` subcommand.
#[derive(clap::Args)]
struct CollectionArgs {
    /// BGG username.
    #[arg(long, required = true)]
    username: String,

    /// Include games that are not owned (wishlist, previously owned, ...).
    #[arg(long)]
    all: bool,

    /// Fail instead of waiting while BGG prepares the collection.
    #[arg(long)]
    no_wait: bool,
}

/// Arguments for the `search` subcommand.
#[derive(clap::Args)]
struct SearchArgs {
    /// Search query (e.g. "catan").
    #[arg(long, required = true)]
    query: String,
}

/// Arguments for the `plays` subcommand.
#[derive(clap::Args)]
struct PlaysArgs {
    /// BGG username.
    #[arg(long, required = true)]
    username: String,

    /// Earliest play date, "YYYY-MM-DD".
    #[arg(long)]
    mindate: Option<NaiveDate>,

    /// Latest play date, "YYYY-MM-DD".
    #[arg(long)]
    maxdate: Option<NaiveDate>,

    /// Item subtype filter (e.g. "boardgame").
    #[arg(long)]
    subtype: Option<String>,
}

/// Arguments for the `snapshot` subcommand.
#[derive(clap::Args)]
struct SnapshotArgs {
    /// Snapshot date, "YYYY-MM-DD".
    #[arg(long, required = true)]
    date: NaiveDate,

    /// Number of top-ranked games to show.
    #[arg(long, default_value_t = 10)]
    top: u32,
}

/// Arguments for the `cache` subcommand.
#[derive(clap::Args)]
struct CacheCommand {
    /// Cache subcommand to run.
    #[command(subcommand)]
    command: CacheSubcommands,
}

/// Available cache subcommands.
#[derive(Subcommand)]
enum CacheSubcommands {
    /// Delete expired responses.
    Purge,
}

/// Loads the config file and applies `BGG_API_TOKEN`.
///
/// # Errors
///
/// Returns an error if the config path cannot be resolved or the file is invalid.
fn load_config(dir: Option<&Path>) -> Result<(AppConfig, AppPaths)> {
    let paths = AppPaths::resolve(dir).context("failed to resolve config path")?;
    let config = AppConfig::load(paths.config_file()).context("failed to load config")?;
    Ok((config.with_env_token(std::env::var("BGG_API_TOKEN").ok()), paths))
}

/// Opens the on-disk response cache.
///
/// # Errors
///
/// Returns an error if the cache database cannot be opened.
fn open_cache_db(config: &AppConfig, paths: &AppPaths) -> Result<ResponseCache> {
    let cache_dir = paths.cache_dir(&config.cache);
    ResponseCache::open(cache_dir.as_deref(), config.cache.ttl())
        .context("failed to open response cache")
}

/// Opens the response cache unless it is disabled.
///
/// # Errors
///
/// Returns an error if the cache database cannot be opened.
fn open_cache(config: &AppConfig, paths: &AppPaths) -> Result<Option<Arc<ResponseCache>>> {
    if !config.cache.enabled {
        tracing::debug!("Response cache disabled");
        return Ok(None);
    }
    Ok(Some(Arc::new(open_cache_db(config, paths)?)))
}

/// Builds a `BggClient` from the config file and environment.
///
/// # Errors
///
/// Returns an error if config loading, cache opening or client build fails.
#[instrument(skip_all)]
fn build_client(dir: Option<&Path>) -> Result<BggClient> {
    let (config, paths) = load_config(dir)?;
    let cache = open_cache(&config, &paths)?;

    let mut builder = BggClient::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .config(config.client);
    if let Some(cache) = cache {
        builder = builder.cache(cache);
    }
    builder.build().context("failed to build BGG client")
}

/// Formats an optional value, `-` when absent.
fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| String::from("-"), |v| v.to_string())
}

/// Logs the one-line summary of a game.
///
/// # Errors
///
/// Returns an error if the game data cannot be loaded.
async fn log_game_row(game: &Game<'_>) -> Result<()> {
    tracing::info!(
        "{}\t{}\t{}\t{}",
        game.id(),
        game.year_published().await.map(or_dash)?,
        game.average_rating()
            .await?
            .map_or_else(|| String::from("-"), |v| format!("{v:.2}")),
        game.name().await?,
    );
    Ok(())
}

/// Runs the `game` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build or a request fails.
#[instrument(skip_all, fields(id = args.id))]
async fn run_game(args: &GameArgs, dir: Option<&Path>) -> Result<()> {
    let client = build_client(dir)?;
    let game = if args.ratings_pages > 0 {
        client
            .get_game_with_ratings(args.id, args.ratings_pages)
            .await
            .context("failed to fetch ratings")?
    } else {
        client.get_game(args.id)
    };

    tracing::info!("Name:\t\t{}", game.name().await.context("failed to fetch game")?);
    tracing::info!("Year:\t\t{}", or_dash(game.year_published().await?));
    tracing::info!(
        "Average:\t{}",
        game.average_rating()
            .await?
            .map_or_else(|| String::from("-"), |v| format!("{v:.3}"))
    );
    tracing::info!("Owned by:\t{}", or_dash(game.owned_by().await?));

    let suggestions = game.player_suggestions().await?;
    if !suggestions.is_empty() {
        tracing::info!("Players\tBest\tRec\tNotRec");
        for s in &suggestions {
            tracing::info!(
                "{}\t{}\t{}\t{}",
                s.player_count,
                s.best,
                s.recommended,
                s.not_recommended
            );
        }
    }

    let ratings = game.ratings();
    if ratings.pages_fetched() > 0 {
        tracing::info!("User\t\tRating\tComment");
        for r in ratings {
            tracing::info!("{}\t\t{}\t{}", r.username, r.rating, r.comment);
        }
        tracing::info!(
            "Fetched {} of {} ratings ({} of {} pages)",
            ratings.fetched(),
            ratings.len(),
            ratings.pages_fetched(),
            or_dash(ratings.total_pages()),
        );
    }

    Ok(())
}

/// Runs the `games` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build or the request fails.
#[instrument(skip_all)]
async fn run_games(args: &GamesArgs, dir: Option<&Path>) -> Result<()> {
    let client = build_client(dir)?;
    let games = client
        .get_games(&args.ids)
        .await
        .context("failed to fetch games")?;

    tracing::info!("ID\tYear\tAverage\tName");
    for game in &games {
        log_game_row(game).await?;
    }
    tracing::info!("Total: {} games", games.len());

    Ok(())
}

/// Runs the `user` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build or the request fails.
#[instrument(skip_all)]
async fn run_user(args: &UserArgs, dir: Option<&Path>) -> Result<()> {
    let client = build_client(dir)?;
    let user = client.get_user(&args.name);

    tracing::info!("Name:\t\t{}", user.name().await.context("failed to fetch user")?);
    tracing::info!("ID:\t\t{}", or_dash(user.id().await?));
    tracing::info!("Registered:\t{}", or_dash(user.year_registered().await?));

    Ok(())
}

/// Runs the `collection` subcommand.
///
/// With `--no-wait`, a collection BGG is still preparing is reported
/// instead of retried.
///
/// # Errors
///
/// Returns an error if the client fails to build or the request fails.
#[instrument(skip_all)]
async fn run_collection(args: &CollectionArgs, dir: Option<&Path>) -> Result<()> {
    let client = build_client(dir)?;
    let options = CollectionOptions {
        own: if args.all { None } else { Some(true) },
        accept_queued: !args.no_wait,
    };
    let collection = client.get_user(&args.username).collection_with(options);

    let games = match collection.games().await {
        Ok(games) => games,
        Err(e) if e.is_queued() => {
            tracing::info!("BGG is preparing the collection of {}; try again shortly", args.username);
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to fetch collection"),
    };

    tracing::info!("ID\tYear\tAverage\tName");
    for game in games {
        log_game_row(game).await?;
    }
    tracing::info!("Total: {} games", games.len());

    Ok(())
}

/// Runs the `search` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build or the request fails.
#[instrument(skip_all)]
async fn run_search(args: &SearchArgs, dir: Option<&Path>) -> Result<()> {
    let client = build_client(dir)?;
    let games = client
        .search(&args.query)
        .await
        .context("search request failed")?;

    tracing::info!("ID\tYear\tName");
    for game in &games {
        tracing::info!(
            "{}\t{}\t{}",
            game.id(),
            or_dash(game.year_published().await?),
            game.name().await?,
        );
    }
    tracing::info!("Total: {} results", games.len());

    Ok(())
}

/// Runs the `plays` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build, the date range is
/// inverted, or a request fails.
#[instrument(skip_all)]
async fn run_plays(args: &PlaysArgs, dir: Option<&Path>) -> Result<()> {
    if let (Some(min), Some(max)) = (args.mindate, args.maxdate) {
        anyhow::ensure!(min <= max, "--mindate must not be after --maxdate");
    }

    let client = build_client(dir)?;
    let query = PlaysQuery {
        min_date: args.mindate,
        max_date: args.maxdate,
        subtype: args.subtype.clone(),
    };
    let plays = client.get_plays(&args.username, query);
    let all = plays.plays().await.context("failed to fetch plays")?;

    tracing::info!("Date\t\tQty\tMinutes\tPlayers\tGame");
    for play in all {
        tracing::info!(
            "{}\t{}\t{}\t{}\t{}{}",
            or_dash(play.date),
            play.quantity,
            play.length_minutes,
            play.players.len(),
            play.game_name.as_deref().unwrap_or("-"),
            if play.incomplete { " (incomplete)" } else { "" },
        );
    }
    let sessions: u64 = all.iter().map(|p| u64::from(p.quantity)).sum();
    tracing::info!("Total: {} entries, {} plays", all.len(), sessions);

    Ok(())
}

/// Runs the `snapshot` subcommand.
///
/// # Errors
///
/// Returns an error if the client fails to build or the CSV cannot be fetched.
#[instrument(skip_all, fields(date = %args.date))]
async fn run_snapshot(args: &SnapshotArgs, dir: Option<&Path>) -> Result<()> {
    let client = build_client(dir)?;
    let snapshot = client
        .get_rank_snapshot(args.date)
        .await
        .with_context(|| format!("failed to fetch rank snapshot for {}", args.date))?;

    tracing::info!("Rank\tID\tYear\tGeek\tAverage\tName");
    for rank in 1..=args.top {
        let Some(id) = snapshot.id_at_rank(rank) else {
            continue;
        };
        tracing::info!(
            "{}\t{}\t{}\t{:.3}\t{:.3}\t{}",
            rank,
            id,
            snapshot.year(id),
            snapshot.bayes_average_rating(id),
            snapshot.average_rating(id),
            snapshot.name(id),
        );
    }
    tracing::info!("Total: {} ranked games", snapshot.len());

    Ok(())
}

/// Runs the `cache purge` subcommand.
///
/// # Errors
///
/// Returns an error if the cache cannot be opened or purged.
#[instrument(skip_all)]
fn run_cache_purge(dir: Option<&Path>) -> Result<()> {
    let (config, paths) = load_config(dir)?;
    let cache = open_cache_db(&config, &paths)?;

    let purged = cache.purge_expired().context("failed to purge cache")?;
    let remaining = cache.len().context("failed to count cache entries")?;
    tracing::info!("Purged {purged} expired responses, {remaining} remaining");

    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    let dir = cli.dir.as_deref();
    match cli.command {
        Commands::Game(args) => run_game(&args, dir).await,
        Commands::Games(args) => run_games(&args, dir).await,
        Commands::User(args) => run_user(&args, dir).await,
        Commands::Collection(args) => run_collection(&args, dir).await,
        Commands::Search(args) => run_search(&args, dir).await,
        Commands::Plays(args) => run_plays(&args, dir).await,
        Commands::Snapshot(args) => run_snapshot(&args, dir).await,
        Commands::Cache(cache) => match cache.command {
            CacheSubcommands::Purge => run_cache_purge(dir),
        },
    }
}
