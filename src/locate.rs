//! Resolve result numbers from a cached search back to files.
//!
//! Numbers are positions in [`grep_bridge::HitStore::flatten`] of the newest live cache
//! entry for the query, so they match what the numbered output printed.

use grep_bridge::{NumberedHit, page_count, paginate};
use tracing::{debug, warn};

use crate::cache::{CacheEntry, ResultCache};
use crate::error::BridgeError;

/// What to pick out of the flattened result list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocateRequest {
    /// 1-based result numbers in the caller's order; empty means all.
    pub numbers: Vec<usize>,
    /// 1-based page over the selected hits. Both or neither with `page_size`.
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl LocateRequest {
    pub fn numbers(numbers: impl Into<Vec<usize>>) -> Self {
        Self {
            numbers: numbers.into(),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<Option<(usize, usize)>, BridgeError> {
        match (self.page, self.page_size) {
            (None, None) => Ok(None),
            (Some(0), _) => Err(BridgeError::InvalidArgs("page must be >= 1".to_string())),
            (_, Some(0)) => Err(BridgeError::InvalidArgs("pageSize must be >= 1".to_string())),
            (Some(page), Some(size)) => Ok(Some((page, size))),
            // A lone page number uses the default page size.
            (Some(page), None) => Ok(Some((page, DEFAULT_PAGE_SIZE))),
            (None, Some(size)) => Ok(Some((1, size))),
        }
    }
}

/// Page size when only `page` is given.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Result of a lookup: the resolved hits plus any requested numbers that had
/// no match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocateOutcome {
    pub hits: Vec<NumberedHit>,
    pub missing: Vec<usize>,
    /// Size of the full flattened list.
    pub available: usize,
}

/// Load the newest readable cache entry whose stored query is `query`.
pub fn latest_entry(cache: &ResultCache, query: &str) -> Result<CacheEntry, BridgeError> {
    let keys = cache.find_by_query(query);
    if keys.is_empty() {
        return Err(BridgeError::NoCachedResults {
            query: query.to_string(),
        });
    }
    // Newest first; a record can expire or vanish between listing and reading.
    keys.iter()
        .find_map(|key| cache.get(key))
        .ok_or_else(|| BridgeError::NoCachedResults {
            query: query.to_string(),
        })
}

/// Resolve `request` against the cached results for `query`.
///
/// Unknown numbers are dropped with a warning. Only when every requested
/// number is unknown does this fail, with `InvalidResultNumbers`.
pub fn locate(cache: &ResultCache, query: &str, request: &LocateRequest) -> Result<LocateOutcome, BridgeError> {
    let paging = request.validate()?;
    let entry = latest_entry(cache, query)?;
    let flat = entry.data.hits.flatten();
    let available = flat.len();
    debug!(query = %query, available, timestamp_ms = entry.timestamp_ms, "Located cached results");

    let (selected, missing) = if request.numbers.is_empty() {
        (flat, Vec::new())
    } else {
        select_numbers(flat, &request.numbers)
    };

    if !missing.is_empty() {
        if selected.is_empty() {
            return Err(BridgeError::InvalidResultNumbers {
                requested: request.numbers.clone(),
                available,
            });
        }
        warn!(query = %query, missing = ?missing, available, "Dropping unknown result numbers");
    }

    let hits = match paging {
        Some((page, size)) => {
            debug!(page, page_size = size, pages = page_count(selected.len(), size), "Paging located results");
            paginate(&selected, page, size).to_vec()
        }
        None => selected,
    };
    Ok(LocateOutcome {
        hits,
        missing,
        available,
    })
}

/// Pick `numbers` out of `flat` in the caller's order. Duplicates resolve
/// once.
fn select_numbers(flat: Vec<NumberedHit>, numbers: &[usize]) -> (Vec<NumberedHit>, Vec<usize>) {
    let mut selected = Vec::with_capacity(numbers.len());
    let mut missing = Vec::new();
    let mut seen = vec![false; flat.len()];
    for &n in numbers {
        match n.checked_sub(1).filter(|&i| i < flat.len()) {
            Some(i) if !seen[i] => {
                seen[i] = true;
                selected.push(flat[i].clone());
            }
            Some(_) => {}
            None => {
                if !missing.contains(&n) {
                    missing.push(n);
                }
            }
        }
    }
    (selected, missing)
}
