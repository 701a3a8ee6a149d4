//! Command-line interface for vidport.
//!
//! Provides commands for pulling the source library into the local
//! cache, pushing it to the destination, building the ownership table,
//! and inspecting local state.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, Config};
use crate::domain::{Profile, Video};
use crate::engine::{OwnershipTable, PullEngine, PushEngine, PushOptions, PushReport};
use crate::platform::{DestinationClient, SourceClient};
use crate::store::{ContentStore, MappingStore, ResourceCache};

/// vidport - pull/cache/push migration between hosted video platforms
#[derive(Parser, Debug)]
#[command(name = "vidport")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull all source records and assets into the local cache
    Pull {
        /// Refresh snapshots and assets even when already cached
        #[arg(long)]
        force: bool,
    },

    /// Push cached profiles, then cached videos, to the destination
    Push {
        /// Stop after this many newly pushed resources per loop
        #[arg(short, long)]
        limit: Option<usize>,

        /// Log per-resource failures and continue instead of halting
        #[arg(long)]
        skip_errors: bool,
    },

    /// Push only the cached profiles
    PushProfiles {
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        skip_errors: bool,
    },

    /// Push only the cached videos
    PushVideos {
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        skip_errors: bool,
    },

    /// Build the video-ownership table from a spreadsheet export
    MapOwners {
        /// `;`-delimited CSV with `name` and `email` columns
        csv: PathBuf,
    },

    /// Show cache and mapping counts
    Status,

    /// Show resolved configuration (debug)
    Config,
}

/// Which push loops to run.
enum PushScope {
    All,
    Profiles,
    Videos,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Pull { force } => run_pull(force).await,
            Commands::Push { limit, skip_errors } => {
                run_push(PushScope::All, limit, skip_errors).await
            }
            Commands::PushProfiles { limit, skip_errors } => {
                run_push(PushScope::Profiles, limit, skip_errors).await
            }
            Commands::PushVideos { limit, skip_errors } => {
                run_push(PushScope::Videos, limit, skip_errors).await
            }
            Commands::MapOwners { csv } => map_owners(&csv).await,
            Commands::Status => show_status().await,
            Commands::Config => show_config(),
        }
    }
}

fn stores(config: &Config) -> (ResourceCache, ContentStore, ContentStore) {
    (
        ResourceCache::new(&config.cache_root),
        ContentStore::new(config.attachments_dir()),
        ContentStore::new(config.thumbnails_dir()),
    )
}

async fn run_pull(force: bool) -> Result<()> {
    let config = config::load()?;
    let source = SourceClient::new(
        config.source_url.clone(),
        config.source_bucket.clone(),
        config.source_username.clone(),
        config.source_password.clone(),
        config.page_size,
    );
    let (cache, attachments, thumbnails) = stores(&config);

    let engine = PullEngine::new(&source, &cache, &attachments, &thumbnails);
    let report = engine.pull(force).await?;

    println!(
        "Pulled {} videos and {} profiles ({} attachments downloaded, {} thumbnails stored)",
        report.videos, report.profiles, report.attachments_downloaded, report.thumbnails_stored
    );
    if report.failures > 0 {
        eprintln!(
            "{} resources failed; re-run to retry them",
            report.failures
        );
        std::process::exit(1);
    }
    Ok(())
}

async fn run_push(scope: PushScope, limit: Option<usize>, skip_errors: bool) -> Result<()> {
    let config = config::load()?;
    let dest = DestinationClient::new(
        config.destination_api_url(),
        config.destination_password.clone(),
        config.category,
    );
    let (cache, attachments, thumbnails) = stores(&config);
    let mut mapping = MappingStore::open(config.mapping_path(), config.destination_api_url())
        .await
        .context("Failed to open the identity mapping store")?;
    let ownership = OwnershipTable::load(&config.ownership_path()).await?;

    let options = PushOptions {
        limit,
        skip_errors,
        admin_user: config.destination_username.clone(),
    };
    let mut engine = PushEngine::new(
        &dest,
        &cache,
        &attachments,
        &thumbnails,
        &mut mapping,
        &ownership,
        options,
    );

    let report = match scope {
        PushScope::All => engine.push().await?,
        PushScope::Profiles => {
            let mut report = PushReport::default();
            engine.push_profiles(&mut report).await?;
            report
        }
        PushScope::Videos => {
            let mut report = PushReport::default();
            engine.push_videos(&mut report).await?;
            report
        }
    };

    println!(
        "Pushed {} profiles and {} videos ({} skipped, {} failed)",
        report.profiles_pushed, report.videos_pushed, report.skipped, report.failed
    );
    Ok(())
}

async fn map_owners(csv: &PathBuf) -> Result<()> {
    let config = config::load()?;
    let (cache, _, _) = stores(&config);

    let videos: Vec<Video> = cache.all().await?;
    let profiles: Vec<Profile> = cache.all().await?;
    let table = OwnershipTable::build_from_csv(csv, &videos, &profiles)
        .with_context(|| format!("Failed to build ownership table from {}", csv.display()))?;

    let path = config.ownership_path();
    table.save(&path).await?;
    println!(
        "Recorded {} owner mappings in {}",
        table.len(),
        path.display()
    );
    Ok(())
}

async fn show_status() -> Result<()> {
    let config = config::load()?;
    let (cache, attachments, thumbnails) = stores(&config);
    let mapping = MappingStore::open(config.mapping_path(), config.destination_api_url()).await?;
    let ownership = OwnershipTable::load(&config.ownership_path()).await?;

    let videos = cache.count::<Video>().await?;
    let profiles = cache.count::<Profile>().await?;

    println!("Cache root: {}", config.cache_root.display());
    println!("  Videos:      {videos}");
    println!("  Profiles:    {profiles}");
    println!("  Attachments: {}", dir_entries(attachments.root())?);
    println!("  Thumbnails:  {}", dir_entries(thumbnails.root())?);
    println!("Destination: {}", config.destination_api_url());
    println!("  Mapped:      {}", mapping.len());
    println!("  Owned:       {}", ownership.len());

    Ok(())
}

fn dir_entries(dir: &std::path::Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    Ok(std::fs::read_dir(dir)?.count())
}

fn show_config() -> Result<()> {
    let config = config::load()?;

    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!();
    println!("Source:");
    println!("  URL:      {}", config.source_url);
    println!("  Bucket:   {}", config.source_bucket);
    println!("  Username: {}", config.source_username);
    println!(
        "  Password: {}",
        if config.source_password.is_empty() {
            "(unset - export SOURCE_PASSWORD)"
        } else {
            "(set)"
        }
    );
    println!();
    println!("Destination:");
    println!("  API:      {}", config.destination_api_url());
    println!("  Username: {}", config.destination_username);
    println!(
        "  Password: {}",
        if config.destination_password.is_empty() {
            "(unset - export DEST_PASSWORD)"
        } else {
            "(set)"
        }
    );
    println!("  Category: {}", config.category);
    println!();
    println!("Cache root: {}", config.cache_root.display());
    println!("Page size:  {}", config.page_size);

    Ok(())
}
