//! Search provider access and the multi-page pager.
//!
//! [`SearchProvider`] is the seam to the remote code-search service; the
//! production implementation is [`GrepAppClient`]. [`SearchPager`] drives
//! pages sequentially (the next page number is only known once the previous
//! page is in), merges them into one [`HitStore`], and paces requests with a
//! fixed delay between consecutive fetches.

use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use grep_bridge::{HitStore, SearchResults, MAX_PAGES, PROVIDER_RESULT_CEILING, RESULTS_PER_PAGE};

use crate::cache::{MAX_QUERY_BYTES, ResultCache};
use crate::error::BridgeError;

/// Default delay between two consecutive page fetches.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);

/// Default search endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://grep.app/api/search";

const USER_AGENT: &str = concat!("grep-bridge/", env!("CARGO_PKG_VERSION"));

/// Longest upstream error body carried into an error message.
const MAX_ERROR_BODY: usize = 500;

// ─── Search arguments ───────────────────────────────────────────────

/// A query plus the provider flags and filters it runs with.
///
/// Only `query` feeds the cache key; the flags shape what is fetched but
/// never where it is stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchArgs {
    pub query: String,
    pub case_sensitive: bool,
    pub use_regex: bool,
    pub whole_words: bool,
    /// Regex over `owner/repo`.
    pub repo_filter: Option<String>,
    /// Regex over the file path.
    pub path_filter: Option<String>,
    /// Language names, sent comma-separated.
    pub languages: Vec<String>,
}

impl SearchArgs {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Caller-side validation: non-empty query, regex and whole-word modes
    /// are mutually exclusive, filters must be valid regexes.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.query.trim().is_empty() {
            return Err(BridgeError::InvalidArgs("Query must not be empty".to_string()));
        }
        if self.query.len() > MAX_QUERY_BYTES {
            return Err(BridgeError::InvalidArgs(format!(
                "Query is {} bytes; the limit is {}",
                self.query.len(),
                MAX_QUERY_BYTES
            )));
        }
        if self.use_regex && self.whole_words {
            return Err(BridgeError::InvalidArgs(
                "useRegex and wholeWords are mutually exclusive".to_string(),
            ));
        }
        for pattern in [&self.repo_filter, &self.path_filter].into_iter().flatten() {
            Regex::new(pattern).map_err(|source| BridgeError::InvalidRegex {
                pattern: pattern.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Query-string parameters for one page request.
    pub fn query_params(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", self.query.clone()), ("page", page.to_string())];
        if self.case_sensitive {
            params.push(("case", "true".to_string()));
        }
        if self.use_regex {
            params.push(("regexp", "true".to_string()));
        } else if self.whole_words {
            params.push(("words", "true".to_string()));
        }
        if let Some(repo) = self.repo_filter.as_deref().filter(|s| !s.is_empty()) {
            params.push(("f.repo.pattern", repo.to_string()));
        }
        if let Some(path) = self.path_filter.as_deref().filter(|s| !s.is_empty()) {
            params.push(("f.path.pattern", path.to_string()));
        }
        let languages: Vec<&str> = self
            .languages
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        if !languages.is_empty() {
            params.push(("f.lang", languages.join(",")));
        }
        params
    }
}

// ─── Provider seam ──────────────────────────────────────────────────

/// One hit as the provider returns it, before snippet parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawHit {
    pub repository: String,
    pub path: String,
    pub snippet: String,
}

/// One page of provider output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawPage {
    pub total: u64,
    pub hits: Vec<RawHit>,
}

/// Fetches one page of raw results from a code-search service.
pub trait SearchProvider {
    fn fetch_raw_page(&self, page: u32, args: &SearchArgs) -> Result<RawPage, BridgeError>;
}

/// Blocking HTTP client for the grep.app search API.
pub struct GrepAppClient {
    client: reqwest::blocking::Client,
    endpoint: String,
}

/// Build the blocking HTTP client shared by both remote collaborators.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::blocking::Client, BridgeError> {
    reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .timeout(timeout)
        .build()
        .map_err(|e| BridgeError::InvalidArgs(format!("Failed to build HTTP client: {}", e)))
}

/// Cut an upstream body down to something fit for an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

impl GrepAppClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BridgeError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            endpoint: endpoint.into(),
        })
    }
}

impl SearchProvider for GrepAppClient {
    fn fetch_raw_page(&self, page: u32, args: &SearchArgs) -> Result<RawPage, BridgeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&args.query_params(page))
            .send()
            .map_err(|e| BridgeError::SearchProvider {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| BridgeError::SearchProvider {
            status: Some(status.as_u16()),
            message: format!("failed to read response body: {}", e),
        })?;
        if !status.is_success() {
            return Err(BridgeError::SearchProvider {
                status: Some(status.as_u16()),
                message: truncate_body(&body),
            });
        }
        parse_search_response(&body)
    }
}

// ─── Response wire format ───────────────────────────────────────────

#[derive(Deserialize, Default)]
struct ApiResponse {
    #[serde(default)]
    hits: ApiHits,
}

#[derive(Deserialize, Default)]
struct ApiHits {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    hits: Vec<ApiHit>,
}

#[derive(Deserialize)]
struct ApiHit {
    #[serde(default)]
    repo: RawText,
    #[serde(default)]
    path: RawText,
    #[serde(default)]
    content: ApiContent,
}

#[derive(Deserialize, Default)]
struct RawText {
    #[serde(default)]
    raw: String,
}

#[derive(Deserialize, Default)]
struct ApiContent {
    #[serde(default)]
    snippet: String,
}

/// Decode a search API response body.
pub(crate) fn parse_search_response(body: &str) -> Result<RawPage, BridgeError> {
    let response: ApiResponse = serde_json::from_str(body)?;
    Ok(RawPage {
        total: response.hits.total,
        hits: response
            .hits
            .hits
            .into_iter()
            .map(|h| RawHit {
                repository: h.repo.raw,
                path: h.path.raw,
                snippet: h.content.snippet,
            })
            .collect(),
    })
}

// ─── Pager ──────────────────────────────────────────────────────────

/// One fetched and parsed page.
#[derive(Clone, Debug, Default)]
pub struct PageResult {
    pub next_page: Option<u32>,
    pub hits: HitStore,
    pub total_count: u64,
}

/// Progress after each page: results received so far against the
/// effective cap, `min(total, provider ceiling)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchProgress {
    pub pages_fetched: u32,
    pub received: u64,
    pub cap: u64,
}

pub struct SearchPager<'a> {
    provider: &'a dyn SearchProvider,
    page_delay: Duration,
    max_pages: u32,
}

impl<'a> SearchPager<'a> {
    pub fn new(provider: &'a dyn SearchProvider) -> Self {
        Self {
            provider,
            page_delay: DEFAULT_PAGE_DELAY,
            max_pages: MAX_PAGES,
        }
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Page ceiling; clamped to at least one page.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Fetch `page` and parse its snippets. `next_page` is `page + 1` while
    /// the provider's total exceeds what pages `1..=page` can hold.
    pub fn fetch_page(&self, page: u32, args: &SearchArgs) -> Result<PageResult, BridgeError> {
        let raw = self.provider.fetch_raw_page(page, args)?;
        let mut hits = HitStore::new();
        for hit in &raw.hits {
            hits.add_hit(&hit.repository, &hit.path, &hit.snippet);
        }
        let next_page = (raw.total > RESULTS_PER_PAGE * u64::from(page)).then_some(page + 1);
        debug!(
            page,
            files = hits.file_count(),
            lines = hits.hit_count(),
            total = raw.total,
            "Fetched search page"
        );
        Ok(PageResult {
            next_page,
            hits,
            total_count: raw.total,
        })
    }

    /// Run a full search: page 1, then every following page until the
    /// provider runs out, the page ceiling is hit, or the provider's result
    /// ceiling is covered. Pages are merged in fetch order.
    pub fn search(
        &self,
        args: &SearchArgs,
        progress: &mut dyn FnMut(SearchProgress),
    ) -> Result<SearchResults, BridgeError> {
        let start = Instant::now();
        let first = self.fetch_page(1, args)?;
        let cap = first.total_count.min(PROVIDER_RESULT_CEILING);

        let mut hits = first.hits;
        let mut next = first.next_page;
        let mut pages_fetched = 1u32;
        let mut received = RESULTS_PER_PAGE.min(cap);
        progress(SearchProgress {
            pages_fetched,
            received,
            cap,
        });

        while let Some(page) = next {
            if page > self.max_pages {
                debug!(page, max_pages = self.max_pages, "Page ceiling reached");
                break;
            }
            if u64::from(page - 1) * RESULTS_PER_PAGE >= cap {
                debug!(page, cap, "Provider result ceiling reached");
                break;
            }

            thread::sleep(self.page_delay);
            let result = self.fetch_page(page, args)?;
            pages_fetched += 1;

            let empty_page = result.hits.is_empty();
            hits.merge(result.hits);
            received = received.max((u64::from(page) * RESULTS_PER_PAGE).min(cap));
            progress(SearchProgress {
                pages_fetched,
                received,
                cap,
            });

            if empty_page {
                debug!(page, "Empty page, stopping");
                break;
            }
            next = result.next_page;
        }

        info!(
            query = %args.query,
            pages = pages_fetched,
            total = first.total_count,
            files = hits.file_count(),
            lines = hits.hit_count(),
            elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
            "Search complete"
        );

        Ok(SearchResults {
            hits,
            total_count: first.total_count,
            pages_fetched,
        })
    }
}

/// Run a full search and cache the aggregate under the query's key.
///
/// A failed cache write is logged and otherwise ignored: the search result is
/// valid without it.
pub fn search_and_cache(
    pager: &SearchPager,
    cache: &ResultCache,
    args: &SearchArgs,
    progress: &mut dyn FnMut(SearchProgress),
) -> Result<SearchResults, BridgeError> {
    let results = pager.search(args, progress)?;
    let key = ResultCache::generate_key(&args.query);
    if let Err(e) = cache.put(&key, &results, &args.query) {
        warn!(query = %args.query, key = %key, error = %e, "Failed to cache search results");
    }
    Ok(results)
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
