//! Dataset Ingestion CLI
//!
//! Downloads a FUNGuild or NEMAGuild JSON export (or reads a saved copy), or
//! walks the Catalogue of Life classification on ChecklistBank, normalizes
//! the rows and upserts them into a SQLite dataset table that
//! `guildscope-server` loads at startup.
//!
//! # Usage
//!
//! ```bash
//! # FUNGuild from the default URL into ./data/funguild.sqlite
//! cargo run --bin guildscope-ingest
//!
//! # NEMAGuild, first 100 records, no writes
//! cargo run --bin guildscope-ingest -- --profile nemaguild --limit 100 --dry-run
//!
//! # From a saved export
//! cargo run --bin guildscope-ingest -- --input funguild.json --out /tmp/f.sqlite
//!
//! # Catalogue of Life: Fungi down to order, with parent links
//! cargo run --bin guildscope-ingest -- --profile col --out ./data/col.sqlite
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;

use guildscope_core::db::DatabaseService;
use guildscope_core::ingest::catalogue::{self, children_url, parse_children};
use guildscope_core::ingest::{
    ingest_payload, ingest_tree, ChildrenSource, IngestError, IngestProfile, IngestSummary,
    TreeNode, TreeWalk,
};

#[derive(Parser, Debug)]
#[command(
    name = "guildscope-ingest",
    about = "Ingest FUNGuild, NEMAGuild or Catalogue of Life data into SQLite"
)]
struct Args {
    /// Dataset profile: funguild, nemaguild or col (Catalogue of Life)
    #[arg(long, default_value = "funguild", value_parser = parse_profile)]
    profile: IngestProfile,

    /// Source URL (defaults to the profile's public export, or the
    /// ChecklistBank dataset for col)
    #[arg(long)]
    url: Option<String>,

    /// Read the payload from a file instead of downloading it
    #[arg(long, conflicts_with = "url")]
    input: Option<PathBuf>,

    /// Output SQLite file path
    #[arg(long, default_value = "./data/funguild.sqlite")]
    out: PathBuf,

    /// Target table name (defaults to the profile name)
    #[arg(long)]
    table: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// User-Agent header (defaults to the profile's ingestor name)
    #[arg(long)]
    user_agent: Option<String>,

    /// Fetch and parse but do not write to the database
    #[arg(long)]
    dry_run: bool,

    /// Limit the number of records processed (0 = all)
    #[arg(long)]
    limit: Option<usize>,

    /// Catalogue of Life taxon to walk below
    #[arg(long, default_value = catalogue::DEFAULT_ROOT)]
    root: String,

    /// Catalogue of Life levels to walk below the root (0 = to the leaves)
    #[arg(long, default_value_t = catalogue::DEFAULT_DEPTH)]
    depth: usize,
}

fn parse_profile(s: &str) -> Result<IngestProfile, String> {
    s.parse().map_err(|e: IngestError| e.to_string())
}

async fn fetch_payload(url: &str, timeout: Duration, user_agent: &str) -> anyhow::Result<String> {
    tracing::info!("Fetching data from {}", url);
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()?;
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()?;
    let body = response.text().await?;
    tracing::info!("Fetched {} bytes", body.len());
    Ok(body)
}

/// ChecklistBank `tree/{id}/children`, following pages until the last one
struct ChecklistBank {
    client: reqwest::Client,
    base_url: String,
}

impl ChecklistBank {
    async fn page(&self, id: &str, offset: usize) -> Result<String, IngestError> {
        let fetch_error = |e: reqwest::Error| IngestError::Fetch {
            id: id.to_string(),
            message: e.to_string(),
        };
        let url = children_url(&self.base_url, id, offset);
        tracing::debug!("GET {}", url);
        self.client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(fetch_error)?
            .text()
            .await
            .map_err(fetch_error)
    }
}

#[async_trait]
impl ChildrenSource for ChecklistBank {
    async fn children(&self, id: &str) -> Result<Vec<TreeNode>, IngestError> {
        let mut children = Vec::new();
        loop {
            let page = parse_children(id, &self.page(id, children.len()).await?)?;
            let last = page.is_last();
            children.extend(page.result);
            if last {
                return Ok(children);
            }
        }
    }
}

fn print_summary(args: &Args, summary: &IngestSummary, elapsed: Duration) {
    println!("\n--- Ingestion Summary ({}) ---", summary.profile);
    println!("Total Records Fetched: {}", summary.fetched);
    match args.limit.filter(|l| *l > 0) {
        Some(limit) => println!("Processing Limited To: {}", limit),
        None => println!("Processing Limited To: All"),
    }
    println!("Total Valid Records:   {}", summary.valid);
    println!("Skipped (No Key):      {}", summary.skipped);
    if summary.duplicates_merged > 0 {
        println!("Duplicates Merged:     {}", summary.duplicates_merged);
    }
    match &summary.written {
        Some(written) => {
            println!("Inserted:              {}", written.inserted);
            println!("Updated:               {}", written.updated);
            if written.citations_merged > 0 {
                println!("Citations Merged:      {}", written.citations_merged);
            }
            println!("Database File:         {}", args.out.display());
        }
        None => println!("Mode:                  DRY-RUN (No DB changes)"),
    }
    println!("Elapsed Time:          {:.2} seconds", elapsed.as_secs_f64());
    println!("-------------------------\n");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let started = Instant::now();
    let profile = args.profile;

    let table = args
        .table
        .clone()
        .unwrap_or_else(|| profile.default_table().to_string());
    let user_agent = args
        .user_agent
        .as_deref()
        .unwrap_or(profile.default_user_agent());
    let timeout = Duration::from_secs(args.timeout);

    if profile.walks_tree() {
        if args.input.is_some() {
            anyhow::bail!("--input is not supported for the {} profile", profile);
        }
        let source = ChecklistBank {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(user_agent)
                .build()?,
            base_url: args.url.clone().unwrap_or_else(|| profile.default_url().to_string()),
        };
        let walk = TreeWalk {
            root: args.root.clone(),
            max_depth: Some(args.depth).filter(|&d| d > 0),
            limit: args.limit,
        };
        tracing::info!("Walking the Catalogue of Life below {}", walk.root);

        let summary = if args.dry_run {
            ingest_tree(&source, &walk, None).await?
        } else {
            tracing::info!("Connecting to {}...", args.out.display());
            let db = DatabaseService::open(args.out.clone()).await?;
            ingest_tree(&source, &walk, Some((&db, table.as_str()))).await?
        };
        print_summary(&args, &summary, started.elapsed());
        return Ok(());
    }

    let payload = match &args.input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let url = args.url.as_deref().unwrap_or(profile.default_url());
            fetch_payload(url, timeout, user_agent).await?
        }
    };

    let summary = if args.dry_run {
        ingest_payload(&payload, profile, args.limit, None).await?
    } else {
        tracing::info!("Connecting to {}...", args.out.display());
        let db = DatabaseService::open(args.out.clone()).await?;
        ingest_payload(&payload, profile, args.limit, Some((&db, table.as_str()))).await?
    };

    print_summary(&args, &summary, started.elapsed());
    Ok(())
}
