//! CLI layer: argument parsing, command dispatch, and subcommand implementations.

pub mod args;
mod info;
mod serve;

pub use args::*;

use std::io::Write;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::error::BridgeError;
use crate::format::{render_fetched, render_hit_list, render_results};
use crate::hosting::{FileHost, FileRequest, fetch_files};
use crate::locate::{LocateRequest, locate};
use crate::provider::{SearchProgress, search_and_cache};

// ─── CLI ─────────────────────────────────────────────────────────────

/// Search public code on grep.app, cache the merged results, and fetch
/// matching files from GitHub
#[derive(Parser, Debug)]
#[command(name = "grep-bridge", version, about, after_help = "\
Run 'grep-bridge <COMMAND> --help' for detailed options and examples.\n\
Typical flow: 'grep-bridge search <query>' then 'grep-bridge locate <query> -n 1,3 --fetch'")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Start MCP (Model Context Protocol) server over stdio.
    Serve(ServeArgs),

    /// Run a full multi-page search and cache the merged results
    Search(QueryArgs),

    /// Resolve result numbers of a cached search to files
    Locate(LocateArgs),

    /// Fetch one file from GitHub
    Fetch(FetchArgs),

    /// List cached searches
    CacheInfo(CacheArgs),

    /// Remove expired entries and enforce the cache size cap
    Cleanup(CacheArgs),
}

impl Commands {
    fn bridge_args(&self) -> &BridgeArgs {
        match self {
            Commands::Serve(a) => &a.bridge,
            Commands::Search(a) => &a.bridge,
            Commands::Locate(a) => &a.bridge,
            Commands::Fetch(a) => &a.bridge,
            Commands::CacheInfo(a) | Commands::Cleanup(a) => &a.bridge,
        }
    }
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();
    init_logging(&cli.command.bridge_args().log_level);

    let result = match cli.command {
        Commands::Serve(args) => serve::cmd_serve(args),
        Commands::Search(args) => cmd_search(args),
        Commands::Locate(args) => cmd_locate(args),
        Commands::Fetch(args) => cmd_fetch(args),
        Commands::CacheInfo(args) => info::cmd_cache_info(args),
        Commands::Cleanup(args) => info::cmd_cleanup(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Stderr logging. `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

// ─── Commands ───────────────────────────────────────────────────────

fn cmd_search(args: QueryArgs) -> Result<(), BridgeError> {
    let config = BridgeConfig::from(&args.bridge);
    let search = args.search_args();
    search.validate()?;

    let client = config.search_client()?;
    let pager = config.pager(&client);
    let cache = config.cache();

    let mut on_progress = |p: SearchProgress| {
        eprint!("\r[search] page {} -- {}/{} results", p.pages_fetched, p.received, p.cap);
        let _ = std::io::stderr().flush();
    };
    let results = search_and_cache(&pager, &cache, &search, &mut on_progress)?;
    eprintln!();

    print!("{}", render_results(&search.query, &results, args.format)?);
    Ok(())
}

fn cmd_locate(args: LocateArgs) -> Result<(), BridgeError> {
    let config = BridgeConfig::from(&args.bridge);
    let cache = config.cache();
    let request = LocateRequest {
        page: args.page,
        page_size: args.page_size,
        ..LocateRequest::numbers(args.numbers.clone())
    };
    let outcome = locate(&cache, &args.query, &request)?;
    if !outcome.missing.is_empty() {
        eprintln!(
            "Skipped result numbers {:?} (valid range: 1..={})",
            outcome.missing, outcome.available
        );
    }

    if !args.fetch {
        print!("{}", render_hit_list(&outcome.hits));
        return Ok(());
    }

    let host = config.github_client()?;
    let requests = outcome
        .hits
        .iter()
        .map(|hit| FileRequest {
            repository: hit.repository.clone(),
            path: hit.path.clone(),
            git_ref: args.git_ref.clone(),
        })
        .collect();
    let files = fetch_files(&host, requests);
    print!("{}", render_fetched(&outcome.hits, &files));
    Ok(())
}

fn cmd_fetch(args: FetchArgs) -> Result<(), BridgeError> {
    let host = BridgeConfig::from(&args.bridge).github_client()?;
    let content = host.fetch_file(&args.repository, &args.path, args.git_ref.as_deref())?;
    print!("{}", content);
    Ok(())
}
