//! CLI entry point for `mboxforum`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mboxforum::config::{self, Config};
use mboxforum::forum;
use mboxforum::import::{finalize, ImportOptions, ImportStats, Importer};
use mboxforum::model::forum::{SubscriptionKind, VoteKind};
use mboxforum::model::message::SkipReason;
use mboxforum::model::post::PostId;
use mboxforum::remote::{HttpSource, RemoteBodyFetcher};
use mboxforum::store::{Repository, SnapshotRepository};

#[derive(Parser)]
#[command(
    name = "mboxforum",
    version,
    about = "Import mailing-list archives into a Q&A forum store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Forum store file (overrides the configured path)
    #[arg(long, value_name = "PATH", global = true)]
    store: Option<PathBuf>,

    /// Configuration file (overrides $MBOXFORUM_CONFIG)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an MBOX archive as forum posts
    Import {
        /// MBOX file to import
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
        /// Stop after this many accepted messages
        #[arg(short, long)]
        limit: Option<usize>,
        /// Tags for new threads, comma separated
        #[arg(short, long)]
        tags: Option<String>,
        /// Parse and link only, write nothing
        #[arg(short, long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// Recompute every user's score and last login from their posts
    Recount,
    /// Move posts to the top by setting their rank to now
    Bump {
        /// Post ids, comma separated
        #[arg(short, long)]
        uids: String,
    },
    /// Reset posts' rank to their creation date
    Unbump {
        /// Post ids, comma separated
        #[arg(short, long)]
        uids: String,
    },
    /// Cast or withdraw a vote (upvote, bookmark, accept)
    Vote {
        #[arg(long)]
        post: PostId,
        /// Email of the voter
        #[arg(long)]
        user: String,
        #[arg(long)]
        kind: VoteKind,
    },
    /// Follow or unfollow a thread (messages, email, unfollow)
    Subscribe {
        #[arg(long)]
        root: PostId,
        /// Email of the subscriber
        #[arg(long)]
        user: String,
        #[arg(long)]
        kind: SubscriptionKind,
    },
    /// Show store statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the config file location
        #[arg(long)]
        init: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let store = cli
        .store
        .clone()
        .unwrap_or_else(|| config::store_path(&config));

    match cli.command {
        Commands::Import {
            file,
            limit,
            tags,
            dry_run,
            json,
        } => cmd_import(
            file.as_deref(),
            limit,
            tags.as_deref(),
            dry_run,
            json,
            &store,
            &config,
        ),
        Commands::Recount => cmd_recount(&store),
        Commands::Bump { uids } => cmd_bump(&store, &uids, false),
        Commands::Unbump { uids } => cmd_bump(&store, &uids, true),
        Commands::Vote { post, user, kind } => cmd_vote(&store, post, &user, kind),
        Commands::Subscribe { root, user, kind } => cmd_subscribe(&store, root, &user, kind),
        Commands::Stats { json } => cmd_stats(&store, json),
        Commands::Config { init } => cmd_config(&config, init),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = log_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "mboxforum.log".into());

    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn cmd_import(
    file: Option<&Path>,
    limit: Option<usize>,
    tags: Option<&str>,
    dry_run: bool,
    json: bool,
    store: &Path,
    config: &Config,
) -> anyhow::Result<()> {
    let Some(path) = file else {
        tracing::warn!("No input file given, nothing to import");
        return Ok(());
    };
    if !path.exists() {
        anyhow::bail!("MBOX file not found: {}", path.display());
    }

    let options = ImportOptions::from_config(&config.import)
        .with_limit(limit)
        .with_tags(tags.unwrap_or(""))
        .with_dry_run(dry_run)
        .with_work_dir(config::cache_dir(config));

    let fetcher = if config.remote.enabled {
        let source = HttpSource::new(
            Duration::from_secs(config.remote.timeout_secs),
            &config.remote.user_agent,
        )?;
        Some(RemoteBodyFetcher::new(
            Box::new(source),
            config::remote_cache_dir(config),
            config.remote.marker.clone(),
        ))
    } else {
        None
    };

    let mut repo = SnapshotRepository::open(store)?;
    let mut importer = Importer::new(&options);
    if let Some(fetcher) = &fetcher {
        importer = importer.with_fetcher(fetcher);
    }

    let file_size = std::fs::metadata(path)?.len();
    let pb = ProgressBar::new(file_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} Importing [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let stats = importer.run(
        path,
        &mut repo,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if json {
        print_import_json(path, store, &stats, elapsed)?;
    } else {
        print_import_table(path, file_size, store, &stats, elapsed);
    }
    Ok(())
}

fn cmd_recount(store: &Path) -> anyhow::Result<()> {
    let mut repo = SnapshotRepository::open(store)?;
    let summary = finalize::recount(&mut repo)?;
    repo.flush()?;
    println!(
        "  Recounted {} user(s), {} updated",
        summary.users, summary.updated
    );
    Ok(())
}

fn cmd_bump(store: &Path, uids: &str, reset: bool) -> anyhow::Result<()> {
    let ids = forum::parse_uids(uids)?;
    let mut repo = SnapshotRepository::open(store)?;
    let changed = if reset {
        forum::unbump(&mut repo, &ids)?
    } else {
        forum::bump(&mut repo, &ids, chrono::Utc::now())?
    };
    repo.flush()?;
    println!("  Updated rank of {changed} of {} post(s)", ids.len());
    Ok(())
}

fn cmd_vote(store: &Path, post: PostId, user: &str, kind: VoteKind) -> anyhow::Result<()> {
    let mut repo = SnapshotRepository::open(store)?;
    let outcome = forum::toggle_vote(&mut repo, post, &user.to_lowercase(), kind, chrono::Utc::now())?;
    repo.flush()?;
    println!("  {} (change {:+})", outcome.message, outcome.change);
    Ok(())
}

fn cmd_subscribe(
    store: &Path,
    root: PostId,
    user: &str,
    kind: SubscriptionKind,
) -> anyhow::Result<()> {
    let mut repo = SnapshotRepository::open(store)?;
    forum::subscribe(&mut repo, root, &user.to_lowercase(), kind, chrono::Utc::now())?;
    repo.flush()?;
    println!("  Changed subscription.");
    Ok(())
}

fn cmd_stats(store: &Path, json: bool) -> anyhow::Result<()> {
    let repo = SnapshotRepository::open(store)?;
    let stats = forum::forum_stats(&repo, 10)?;

    if json {
        let output = serde_json::json!({
            "store": store.to_string_lossy(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    use humansize::{format_size, BINARY};
    let store_size = std::fs::metadata(store).map(|m| m.len()).unwrap_or(0);

    println!();
    println!("  {:<20} {}", "Store", store.display());
    println!("  {:<20} {}", "Store size", format_size(store_size, BINARY));
    println!("  {:<20} {}", "Users", stats.users);
    println!(
        "  {:<20} {} ({} questions, {} answers, {} comments)",
        "Posts", stats.posts, stats.questions, stats.answers, stats.comments
    );
    if let (Some(first), Some(last)) = (stats.first_post, stats.last_post) {
        println!(
            "  {:<20} {} to {}",
            "Date range",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        );
    }
    if !stats.top_authors.is_empty() {
        println!();
        println!("  Top authors:");
        for (email, count) in &stats.top_authors {
            println!("    {count:>6}  {email}");
        }
    }
    println!();
    Ok(())
}

fn cmd_config(config: &Config, init: bool) -> anyhow::Result<()> {
    if init {
        let path = config::save_config(config)?;
        println!("  Wrote {}", path.display());
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxforum", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Print the import summary in a human-readable table.
fn print_import_table(
    path: &Path,
    file_size: u64,
    store: &Path,
    stats: &ImportStats,
    elapsed: Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<28} {}", "File", path.display());
    println!("  {:<28} {}", "File size", format_size(file_size, BINARY));
    println!("  {:<28} {}", "Records read", stats.records_read);
    println!("  {:<28} {}", "Accepted", stats.accepted);
    println!("  {:<28} {}", "Users found", stats.users_found);
    println!("  {:<28} {}", "Users created", stats.users_created);
    println!(
        "  {:<28} {} ({} questions, {} answers, {} comments)",
        "Posts created", stats.posts_created, stats.questions, stats.answers, stats.comments
    );
    if stats.orphans_promoted > 0 || stats.orphans_relinked > 0 {
        println!(
            "  {:<28} {} promoted, {} relinked",
            "Orphaned replies", stats.orphans_promoted, stats.orphans_relinked
        );
    }
    match stats.limit {
        Some(limit) => println!("  {:<28} {}", "Post limit", limit),
        None => println!("  {:<28} none", "Post limit"),
    }

    println!(
        "  {:<28} {}",
        "Skipped due to size",
        stats.skipped(SkipReason::TooLarge)
    );
    println!(
        "  {:<28} {}",
        "Skipped due to missing parent",
        stats.skipped(SkipReason::MissingParent)
    );
    let other: Vec<String> = SkipReason::ALL
        .iter()
        .filter(|r| !matches!(r, SkipReason::TooLarge | SkipReason::MissingParent))
        .filter_map(|&r| match stats.skipped(r) {
            0 => None,
            n => Some(format!("{} {}", n, r.label())),
        })
        .collect();
    if !other.is_empty() {
        println!("  {:<28} {}", "Other skipped", other.join(", "));
    }

    println!("  {:<28} {:.2?}", "Import time", elapsed);
    if stats.dry_run {
        println!("  {:<28} dry run, no data saved", "Store");
    } else {
        println!("  {:<28} {}", "Store", store.display());
    }
    println!();
}

/// Print the import summary as JSON.
fn print_import_json(
    path: &Path,
    store: &Path,
    stats: &ImportStats,
    elapsed: Duration,
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "file": path.to_string_lossy(),
        "store": store.to_string_lossy(),
        "import_time_ms": elapsed.as_millis(),
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
