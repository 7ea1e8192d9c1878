//! # grep_bridge: code-search aggregation core
//!
//! Data model shared by the `grep-bridge` MCP server: parsing of highlighted
//! HTML snippets, the repository → path → line aggregate built across result
//! pages, cache-key derivation and the pagination helper used when results
//! are handed back by number.
//!
//! ## Library usage
//!
//! The binary owns everything that touches the network, the disk or the tool
//! protocol. This crate only holds pure, deterministic code so it can be
//! benchmarked and property-tested in isolation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod hits;
pub mod snippet;

pub use hits::{HitStore, LineMap, NumberedHit};
pub use snippet::parse_snippet;

/// Number of hits the search provider returns per page.
pub const RESULTS_PER_PAGE: u64 = 10;

/// Highest result count the provider will ever page through.
pub const PROVIDER_RESULT_CEILING: u64 = 1000;

/// Hard ceiling on pages fetched for one search.
pub const MAX_PAGES: u32 = 100;

// ─── Cache keys ─────────────────────────────────────────────────────

/// Normalize a query before key derivation.
///
/// Only surrounding whitespace is dropped. Case and inner whitespace are
/// significant to the provider, so they are significant to the key too.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query.trim().to_string()
}

/// Derive the cache key for a query: lowercase hex SHA-256 of the normalized
/// query text and nothing else.
///
/// This is the only key derivation in the crate. Search flags and page
/// numbers do not take part: every writer and reader of a query shares
/// one record.
#[must_use]
pub fn cache_key(query: &str) -> String {
    let digest = Sha256::digest(normalize_query(query).as_bytes());
    format!("{:x}", digest)
}

// ─── Cached payload ─────────────────────────────────────────────────

/// Aggregated result of one full multi-page search.
///
/// This is the `data` payload stored in the result cache.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Merged hits across every fetched page.
    pub hits: HitStore,
    /// Total match count reported by the provider on page 1.
    pub total_count: u64,
    /// Number of pages actually fetched.
    pub pages_fetched: u32,
}

// ─── Pagination ─────────────────────────────────────────────────────

/// Select a 1-based page out of `items`.
///
/// `start = (page - 1) * page_size`, `end = start + page_size`, both clamped
/// to the slice. Page 0 or size 0 yields an empty slice.
#[must_use]
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size).min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// Total pages needed to show `total` items at `page_size` per page.
#[must_use]
pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}
