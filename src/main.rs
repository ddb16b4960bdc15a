use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use veille::config::Config;
use veille::export;
use veille::ingest;
use veille::storage::{
    Database, ItemFilter, ItemFlag, ItemSummary, SeedFile, SourceKind, StoreError,
};
use veille::util::validate_url;

/// Get the config directory path (~/.config/veille/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("veille"))
}

#[derive(Parser, Debug)]
#[command(name = "veille", about = "Reading-list aggregator for newsletter and video feeds")]
struct Args {
    /// Database file (overrides the config file setting)
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage feed sources
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },
    /// Import sources from a TOML seed file
    Seed {
        /// Seed file with [[sources]] entries
        file: PathBuf,
    },
    /// Fetch enabled sources and merge new items
    Refresh {
        /// Refresh only this source id
        #[arg(long, value_name = "ID")]
        source: Option<i64>,
    },
    /// List items, most recent first
    Items {
        /// Only items from sources of this kind
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        /// Only unread items
        #[arg(long)]
        unread: bool,
        /// Only favorites
        #[arg(long)]
        favorites: bool,
        /// Only items marked to-study
        #[arg(long = "to-study")]
        to_study: bool,
        /// Only items marked watch-later
        #[arg(long = "watch-later")]
        watch_later: bool,
        /// Filter by title substring
        #[arg(long)]
        search: Option<String>,
        /// Ignore the default recency window
        #[arg(long)]
        all: bool,
        /// Maximum number of items to show
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Annotate or open a single item
    Item {
        #[command(subcommand)]
        command: ItemCommand,
    },
    /// Show aggregate counters
    Stats,
    /// Export all notes as a markdown knowledge base
    ExportNotes {
        /// Write to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    /// Subscribe to a feed
    Add {
        name: String,
        url: String,
        #[arg(long, value_enum)]
        kind: KindArg,
    },
    /// List sources with unread counts
    Ls,
    /// Enable a source
    Enable { id: i64 },
    /// Disable a source (kept, but skipped by refresh)
    Disable { id: i64 },
    /// Remove a source and all of its items
    Rm { id: i64 },
}

#[derive(Subcommand, Debug)]
enum ItemCommand {
    /// Mark an item read (or unread with --undo)
    Read {
        id: i64,
        #[arg(long)]
        undo: bool,
    },
    /// Toggle the favorite flag
    Favorite { id: i64 },
    /// Toggle the to-study flag
    ToStudy { id: i64 },
    /// Toggle the watch-later flag
    WatchLater { id: i64 },
    /// Show, set, or clear the notes text
    Note {
        id: i64,
        /// New notes text (omit to show the current note)
        text: Option<String>,
        /// Remove the note
        #[arg(long)]
        clear: bool,
    },
    /// Open the item link in the default browser (marks it read)
    Open { id: i64 },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Article,
    Video,
}

impl From<KindArg> for SourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Article => SourceKind::Article,
            KindArg::Video => SourceKind::Video,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config =
        Config::load(&config_dir.join("config.toml")).context("Failed to load config file")?;

    let db_path = args
        .database
        .clone()
        .or_else(|| config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| config_dir.join("veille.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(StoreError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of veille appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    run(args, config, db).await
}

async fn run(args: Args, config: Config, db: Database) -> Result<()> {
    match args.command {
        Command::Source { command } => run_source(command, &db).await?,

        Command::Seed { file } => {
            let seed = SeedFile::load(&file)?;
            let created = db.seed_sources(&seed.sources).await?;
            println!(
                "Seeded {} new sources ({} in file)",
                created,
                seed.sources.len()
            );
        }

        Command::Refresh { source } => {
            let client = ingest::build_client().context("Failed to build HTTP client")?;
            match source {
                Some(id) => {
                    let added = ingest::refresh_source(&db, &client, id).await?;
                    println!("Refreshed source {}: {} items", id, added);
                }
                None => {
                    let summary = ingest::refresh_all(&db, &client).await?;
                    println!("Refresh complete: {} items", summary.added);
                    for error in &summary.errors {
                        eprintln!("  error: {}", error);
                    }
                }
            }
        }

        Command::Items {
            kind,
            unread,
            favorites,
            to_study,
            watch_later,
            search,
            all,
            limit,
        } => {
            // Flag filters select from the whole history; plain browsing
            // defaults to the configured recency window, like the original
            // inbox view
            let windowed = !(all
                || favorites
                || to_study
                || watch_later
                || search.is_some()
                || config.window_days == 0);
            let since = windowed.then(|| {
                (Utc::now() - chrono::Duration::days(config.window_days as i64)).timestamp()
            });

            let filter = ItemFilter {
                kind: kind.map(Into::into),
                unread_only: unread,
                favorites_only: favorites,
                to_study_only: to_study,
                watch_later_only: watch_later,
                search,
                since,
                limit: limit.unwrap_or(config.page_size as i64),
            };

            let items = db.list_items(&filter).await?;
            if items.is_empty() {
                println!("No items.");
            }
            for item in &items {
                println!(
                    "{:>5}  [{}]  {}  {} ({})",
                    item.id,
                    flag_markers(item),
                    format_date(item.published),
                    item.title,
                    item.source_name
                );
            }
        }

        Command::Item { command } => run_item(command, &db).await?,

        Command::Stats => {
            let stats = db.stats().await?;
            println!("Total:        {}", stats.total);
            println!("Unread:       {}", stats.unread);
            println!("Favorites:    {}", stats.favorites);
            println!("To study:     {}", stats.to_study);
            println!("Watch later:  {}", stats.watch_later);
        }

        Command::ExportNotes { out } => {
            let noted = db.items_with_notes().await?;
            match export::render_notes(&noted, Utc::now()) {
                None => println!("No notes to export."),
                Some(doc) => match out {
                    Some(path) => {
                        std::fs::write(&path, doc).with_context(|| {
                            format!("Failed to write export to {}", path.display())
                        })?;
                        println!("Exported {} notes to {}", noted.len(), path.display());
                    }
                    None => print!("{doc}"),
                },
            }
        }
    }

    Ok(())
}

async fn run_source(command: SourceCommand, db: &Database) -> Result<()> {
    match command {
        SourceCommand::Add { name, url, kind } => {
            validate_url(&url).map_err(|e| anyhow::anyhow!("Invalid source URL: {}", e))?;
            match db.add_source(&name, &url, kind.into()).await {
                Ok(id) => println!("Added source {} ({})", id, name),
                Err(StoreError::Conflict) => {
                    anyhow::bail!("A source with this URL already exists")
                }
                Err(e) => return Err(e.into()),
            }
        }
        SourceCommand::Ls => {
            let sources = db.sources_with_unread().await?;
            if sources.is_empty() {
                println!("No sources. Add one with `veille source add` or `veille seed`.");
            }
            for s in &sources {
                println!(
                    "{:>4}  [{}]  {:<7}  {:>5} unread  {}  {}",
                    s.id,
                    if s.enabled { "on " } else { "off" },
                    s.kind,
                    s.unread_count,
                    s.name,
                    s.url
                );
            }
        }
        SourceCommand::Enable { id } => {
            if !db.set_source_enabled(id, true).await? {
                anyhow::bail!("No source with id {}", id);
            }
            println!("Source {} enabled", id);
        }
        SourceCommand::Disable { id } => {
            if !db.set_source_enabled(id, false).await? {
                anyhow::bail!("No source with id {}", id);
            }
            println!("Source {} disabled", id);
        }
        SourceCommand::Rm { id } => {
            if !db.delete_source(id).await? {
                anyhow::bail!("No source with id {}", id);
            }
            println!("Source {} removed", id);
        }
    }
    Ok(())
}

async fn run_item(command: ItemCommand, db: &Database) -> Result<()> {
    match command {
        ItemCommand::Read { id, undo } => {
            if db.get_item(id).await?.is_none() {
                anyhow::bail!("No item with id {}", id);
            }
            db.set_item_read(id, !undo).await?;
            println!("Item {} marked {}", id, if undo { "unread" } else { "read" });
        }
        ItemCommand::Favorite { id } => report_toggle(db, id, ItemFlag::Favorite, "favorite").await?,
        ItemCommand::ToStudy { id } => report_toggle(db, id, ItemFlag::ToStudy, "to-study").await?,
        ItemCommand::WatchLater { id } => {
            report_toggle(db, id, ItemFlag::WatchLater, "watch-later").await?
        }
        ItemCommand::Note { id, text, clear } => {
            if clear {
                if !db.set_item_notes(id, None).await? {
                    anyhow::bail!("No item with id {}", id);
                }
                println!("Note cleared on item {}", id);
            } else if let Some(text) = text {
                if !db.set_item_notes(id, Some(&text)).await? {
                    anyhow::bail!("No item with id {}", id);
                }
                println!("Note saved on item {}", id);
            } else {
                let item = db
                    .get_item(id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("No item with id {}", id))?;
                match item.notes.as_deref() {
                    Some(notes) if !notes.trim().is_empty() => println!("{}", notes),
                    _ => println!("(no note)"),
                }
            }
        }
        ItemCommand::Open { id } => {
            let item = db
                .get_item(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No item with id {}", id))?;
            open::that(&item.url).with_context(|| format!("Failed to open {}", item.url))?;
            db.set_item_read(id, true).await?;
            println!("Opened {}", item.url);
        }
    }
    Ok(())
}

async fn report_toggle(db: &Database, id: i64, flag: ItemFlag, label: &str) -> Result<()> {
    match db.toggle_item_flag(id, flag).await? {
        Some(on) => println!("Item {} {}: {}", id, label, if on { "on" } else { "off" }),
        None => anyhow::bail!("No item with id {}", id),
    }
    Ok(())
}

fn flag_markers(item: &ItemSummary) -> String {
    let mut markers = String::with_capacity(4);
    markers.push(if item.read { ' ' } else { '*' });
    markers.push(if item.favorite { 'f' } else { ' ' });
    markers.push(if item.to_study { 's' } else { ' ' });
    markers.push(if item.watch_later { 'w' } else { ' ' });
    markers
}

fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
