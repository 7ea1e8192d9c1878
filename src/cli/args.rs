//! CLI argument structs for all subcommands, and the configuration they
//! resolve to.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};

use crate::cache::{ResultCache, default_cache_dir};
use crate::error::BridgeError;
use crate::format::OutputFormat;
use crate::hosting::{DEFAULT_GITHUB_API_URL, GitHubClient};
use crate::provider::{DEFAULT_SEARCH_URL, GrepAppClient, SearchArgs, SearchPager, SearchProvider};

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct BridgeArgs {
    /// Cache directory (default: <user cache dir>/grep-bridge)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Cache size cap in MB; oldest entries are evicted past it
    #[arg(long, default_value = "5120")]
    pub cache_max_mb: u64,

    /// Hours a cached result set stays valid
    #[arg(long, default_value = "24")]
    pub cache_ttl_hours: u64,

    /// Search endpoint
    #[arg(long, default_value = DEFAULT_SEARCH_URL)]
    pub search_url: String,

    /// GitHub API root
    #[arg(long, default_value = DEFAULT_GITHUB_API_URL)]
    pub github_api_url: String,

    /// Delay between consecutive page requests, in ms
    #[arg(long, default_value = "500")]
    pub page_delay_ms: u64,

    /// Most pages fetched per search
    #[arg(long, default_value = "100")]
    pub max_pages: u32,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,

    /// Log level for stderr output (error, warn, info, debug, trace). RUST_LOG overrides it.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub bridge: BridgeArgs,

    /// Maximum response size in KB before truncation (0 = no limit, default: 32).
    #[arg(long, default_value = "32")]
    pub max_response_kb: usize,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"EXAMPLES:
  Plain text:      grep-bridge search "tower_governor"
  Regex:           grep-bridge search "GovernorLayer::\w+" --regex
  Rust files only: grep-bridge search "tower_governor" --lang Rust --path '\.rs$'
  One org:         grep-bridge search "Router::new" --repo '^tokio-rs/'
  JSON:            grep-bridge search "tower_governor" --format json

NOTES:
  - Every result page is fetched (10 per page, at most 1000 results).
  - The merged set is cached; 'grep-bridge locate' resolves its numbers."#)]
pub struct QueryArgs {
    /// Text to search for (a regex with --regex)
    pub query: String,

    /// Case-sensitive match
    #[arg(short = 's', long)]
    pub case_sensitive: bool,

    /// Treat the query as a regular expression
    #[arg(short, long)]
    pub regex: bool,

    /// Match whole words only
    #[arg(short, long)]
    pub words: bool,

    /// Regex over 'owner/repo'
    #[arg(long)]
    pub repo: Option<String>,

    /// Regex over the file path
    #[arg(long)]
    pub path: Option<String>,

    /// Language filter, comma-separated or repeated
    #[arg(long, value_delimiter = ',')]
    pub lang: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Numbered)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub bridge: BridgeArgs,
}

impl QueryArgs {
    pub fn search_args(&self) -> SearchArgs {
        SearchArgs {
            case_sensitive: self.case_sensitive,
            use_regex: self.regex,
            whole_words: self.words,
            repo_filter: self.repo.clone().filter(|s| !s.is_empty()),
            path_filter: self.path.clone().filter(|s| !s.is_empty()),
            languages: self.lang.clone(),
            ..SearchArgs::new(self.query.clone())
        }
    }
}

#[derive(Parser, Debug)]
pub struct LocateArgs {
    /// Query of an earlier search, exactly as it was run
    pub query: String,

    /// Result numbers, comma-separated (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub numbers: Vec<usize>,

    /// 1-based page over the selected results
    #[arg(long)]
    pub page: Option<usize>,

    /// Results per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Download the located files
    #[arg(long)]
    pub fetch: bool,

    /// Branch, tag or commit for --fetch
    #[arg(long = "ref")]
    pub git_ref: Option<String>,

    #[command(flatten)]
    pub bridge: BridgeArgs,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Repository as 'owner/name'
    pub repository: String,

    /// File path inside the repository
    pub path: String,

    /// Branch, tag or commit
    #[arg(long = "ref")]
    pub git_ref: Option<String>,

    #[command(flatten)]
    pub bridge: BridgeArgs,
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(flatten)]
    pub bridge: BridgeArgs,
}

// ─── Resolved configuration ─────────────────────────────────────────

/// Everything a command needs to build its collaborators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    pub cache_dir: PathBuf,
    pub cache_max_bytes: u64,
    pub cache_ttl: Duration,
    pub search_url: String,
    pub github_api_url: String,
    pub page_delay: Duration,
    pub max_pages: u32,
    pub timeout: Duration,
}

impl From<&BridgeArgs> for BridgeConfig {
    fn from(args: &BridgeArgs) -> Self {
        Self {
            cache_dir: args.cache_dir.clone().unwrap_or_else(default_cache_dir),
            cache_max_bytes: args.cache_max_mb.saturating_mul(1024 * 1024),
            cache_ttl: Duration::from_secs(args.cache_ttl_hours.saturating_mul(3600)),
            search_url: args.search_url.clone(),
            github_api_url: args.github_api_url.clone(),
            page_delay: Duration::from_millis(args.page_delay_ms),
            max_pages: args.max_pages,
            timeout: Duration::from_secs(args.timeout_secs),
        }
    }
}

impl BridgeConfig {
    pub fn cache(&self) -> ResultCache {
        ResultCache::with_limits(&self.cache_dir, self.cache_ttl, self.cache_max_bytes)
    }

    pub fn search_client(&self) -> Result<GrepAppClient, BridgeError> {
        GrepAppClient::new(&self.search_url, self.timeout)
    }

    pub fn github_client(&self) -> Result<GitHubClient, BridgeError> {
        GitHubClient::new(&self.github_api_url, self.timeout)
    }

    pub fn pager<'a>(&self, provider: &'a dyn SearchProvider) -> SearchPager<'a> {
        SearchPager::new(provider)
            .with_page_delay(self.page_delay)
            .with_max_pages(self.max_pages)
    }
}
