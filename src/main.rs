use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use postshelf::source::load_collection;
use postshelf::view::{ListPage, Line, Style, detail_lines};
use postshelf::{ClientGuard, Config, ListView, PathPregenerator, RecordResolver, Site, Store, validate};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "postshelf")]
#[command(about = "PostShelf - Browse, filter and favorite posts with validated detail pages")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the store directory (default: current directory)
    #[arg(short, long, default_value = ".")]
    store_path: PathBuf,

    /// Config file (default: <config dir>/postshelf/config.yaml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read posts from the local snapshot instead of the API
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List posts, optionally filtered by title or favorites
    List {
        /// Case-insensitive title filter
        #[arg(short, long, default_value = "")]
        query: String,

        /// Only show favorite posts
        #[arg(short, long)]
        favorites: bool,
    },

    /// Show the detail page for a post
    Show {
        /// Identifier from the route
        id: String,

        /// Identifier seen by the live navigation context (defaults to the route id)
        #[arg(long)]
        live: Option<String>,
    },

    /// Toggle a post in or out of favorites
    Favorite {
        id: String,
    },

    /// Print the number of favorite posts
    Favorites,

    /// Start a new publish cycle and pre-generate detail pages
    Publish,

    /// Save the remote collection as a local snapshot for offline use
    Snapshot,
}

fn print_lines(lines: &[Line]) {
    for line in lines {
        let text = &line.text;
        match line.style {
            Style::Heading => println!("{}", text.bold()),
            Style::Error => println!("{}", text.red().bold()),
            Style::Muted => println!("{}", text.dimmed()),
            Style::Highlight => println!("{}", text.yellow()),
            Style::Plain => println!("{}", text),
        }
    }
}

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.offline {
        config.offline = true;
    }

    // Open store
    let store = Store::open(&cli.store_path)?;

    match cli.command {
        Commands::List { query, favorites } => {
            let source = store.record_store(&config)?;
            let load = load_collection(&source);
            let favorite_store = store.favorites(&config);

            let mut view = ListView::new(load.records, favorite_store.set());
            view.set_query(query, favorite_store.set());
            view.set_favorites_only(favorites, favorite_store.set());

            let page = ListPage {
                view: &view,
                favorites: favorite_store.set(),
                load_error: load.error.as_deref(),
                announcement: favorite_store.announcement(),
            };
            print_lines(&page.lines());
        }
        Commands::Show { id, live } => {
            let source = store.record_store(&config)?;
            let resolver = RecordResolver::new(source, store.page_cache()?);
            let mut site = Site::new(
                resolver,
                PathPregenerator::new(config.pregenerate),
                ClientGuard::new(config.client_id_ceiling),
            );

            let live_id = live.unwrap_or_else(|| id.clone());
            let page = site.open_detail(&id, &live_id);
            print_lines(&detail_lines(&page));

            if let Some(ts) = site.resolver().cache().resolved_at(&id)? {
                let when = chrono::DateTime::from_timestamp_millis(ts)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| ts.to_string());
                println!("{}", format!("Resolved at {}", when).dimmed());
            }
        }
        Commands::Favorite { id } => {
            if !validate::is_valid_id(&id) {
                return Err(eyre!("The ID must be a positive number."));
            }
            let record_id = validate::parse_record_id(&id).ok_or_else(|| eyre!("No post has ID {}", id))?;

            let source = store.record_store(&config)?;
            let load = load_collection(&source);
            let label = load
                .records
                .iter()
                .find(|r| r.id == record_id)
                .map(|r| r.title.clone())
                .unwrap_or_else(|| format!("post {}", record_id));

            let mut favorite_store = store.favorites(&config);
            favorite_store.toggle(record_id, &label);
            println!("{}", favorite_store.announcement().yellow());
        }
        Commands::Favorites => {
            let favorite_store = store.favorites(&config);
            println!("{}", favorite_store.count());
        }
        Commands::Publish => {
            let source = store.record_store(&config)?;
            let resolver = RecordResolver::new(source, store.page_cache()?);
            let mut site = Site::new(
                resolver,
                PathPregenerator::new(config.pregenerate),
                ClientGuard::new(config.client_id_ceiling),
            );

            println!("Publishing detail pages...");
            let report = site.publish()?;
            for error in &report.failed {
                println!(
                    "  {} {}: {}",
                    "failed".red(),
                    error.requested_id,
                    error.message
                );
            }
            println!(
                "Publish complete: {} pages, {} resolved, {} failed",
                report.paths.len(),
                report.resolved,
                report.failed.len()
            );
        }
        Commands::Snapshot => {
            let remote = postshelf::source::HttpRecordStore::new(config.api_url.as_str())?;
            println!("Fetching posts from {}...", remote.base_url());
            let count = store.write_snapshot(&remote)?;
            println!("Snapshot complete: {} posts", count);
        }
    }

    Ok(())
}
