//! Remember CLI
//!
//! Command-line access to a memory catalogue: list, search, import, delete
//! and reconcile.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use remember_core::{
    default_log_level, fit_preview, init_logging, Item, Memory, MemoryService, Point, StoreConfig,
    Tag,
};
use uuid::Uuid;

const PREVIEW_MAX_SIDE: u32 = 1600;

/// Remember - memory catalogue CLI
#[derive(Parser)]
#[command(name = "remember")]
#[command(version = remember_core::core_version())]
#[command(about = "Manage a Remember memory catalogue")]
struct Cli {
    /// Catalogue root (defaults to $REMEMBER_HOME or the platform data dir)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Directory for rotating log files (defaults to <root>/Memories/.config/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List memories, newest first
    List,

    /// Search item names, tags, notes and recognized text
    Search {
        query: String,
    },

    /// List the tag vocabulary
    Tags,

    /// Import an image as a new memory
    Import {
        /// Image file to import
        image: PathBuf,
        /// Item name (repeatable)
        #[arg(long = "item")]
        items: Vec<String>,
        /// Tag label (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a memory and its files
    Delete {
        id: Uuid,
    },

    /// Reconcile records with memory directories
    Sync {
        /// Delete invalid records and orphan directories afterwards
        #[arg(long)]
        purge: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = resolve_config(cli.root.as_deref())?;
    let log_dir = match cli.log_dir {
        Some(dir) => absolute(&dir)?,
        None => config.config_dir().join("logs"),
    };
    if let Err(err) = init_logging(default_log_level(), &log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }

    let service = MemoryService::open(config).context("failed to open memory store")?;

    match cli.command {
        Commands::List => run_list(&service),
        Commands::Search { query } => run_search(&service, &query),
        Commands::Tags => run_tags(&service),
        Commands::Import {
            image,
            items,
            tags,
            notes,
        } => run_import(&service, &image, items, tags, notes),
        Commands::Delete { id } => {
            service.delete(id)?;
            println!("Deleted {id}");
            Ok(())
        }
        Commands::Sync { purge } => run_sync(&service, purge),
    }
}

fn resolve_config(root: Option<&Path>) -> anyhow::Result<StoreConfig> {
    match root {
        Some(root) => Ok(StoreConfig::new(absolute(root)?)),
        None => StoreConfig::from_env().context("could not determine a catalogue root"),
    }
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn print_memories(memories: &[Memory]) {
    if memories.is_empty() {
        println!("No memories.");
        return;
    }
    for memory in memories {
        let title = if memory.is_new() {
            "(new)".to_string()
        } else {
            memory.display_title()
        };
        let tags: Vec<&str> = memory.tags.iter().map(|tag| tag.label.as_str()).collect();
        println!("{}  {}  [{}]", memory.id, title, tags.join(", "));
    }
}

fn run_list(service: &MemoryService) -> anyhow::Result<()> {
    print_memories(&service.fetch_all()?);
    Ok(())
}

fn run_search(service: &MemoryService, query: &str) -> anyhow::Result<()> {
    print_memories(&service.search(query)?);
    Ok(())
}

fn run_tags(service: &MemoryService) -> anyhow::Result<()> {
    for tag in service.fetch_tags()? {
        println!("{}", tag.label);
    }
    Ok(())
}

fn run_import(
    service: &MemoryService,
    image_path: &Path,
    items: Vec<String>,
    tags: Vec<String>,
    notes: Option<String>,
) -> anyhow::Result<()> {
    let image = image::open(image_path)
        .with_context(|| format!("failed to read image {}", image_path.display()))?;
    let preview = fit_preview(&image, PREVIEW_MAX_SIDE, PREVIEW_MAX_SIDE);
    let focus = Point::new(
        f64::from(image.width()) / 2.0,
        f64::from(image.height()) / 2.0,
    );

    let mut memory = Memory::capture(focus);
    let mut names = items.into_iter();
    if let Some(first) = names.next() {
        memory.items[0].name = first;
    }
    for name in names {
        memory.items.push(Item::new(name, focus));
    }
    for label in tags {
        if label.trim().is_empty() {
            bail!("tag labels cannot be blank");
        }
        memory.tags.insert(Tag::new(label));
    }
    memory.notes = notes.unwrap_or_default();
    memory.sort_items();

    service.save(&memory, &image, &preview)?;
    println!("Imported {}", memory.id);
    Ok(())
}

fn run_sync(service: &MemoryService, purge: bool) -> anyhow::Result<()> {
    let report = service.sync()?;
    println!("Invalid memories: {}", report.invalid_memories.len());
    for id in &report.invalid_memories {
        println!("  {id}");
    }
    println!("Orphan directories: {}", report.orphan_directories.len());
    for directory in &report.orphan_directories {
        println!("  {}", directory.display());
    }

    if purge && !report.is_clean() {
        let summary = service.purge(&report)?;
        println!(
            "Purged {} memories and {} directories",
            summary.deleted_memories, summary.removed_directories
        );
    }
    Ok(())
}
