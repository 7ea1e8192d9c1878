//! Tests for search arguments, response decoding and the pager.
//!
//! A scripted in-memory provider stands in for the HTTP API.

use super::*;
use grep_bridge::cache_key;
use std::cell::RefCell;
use tempfile::TempDir;

// ─── Test helpers ───────────────────────────────────────────────────

fn snippet(line: u32, code: &str) -> String {
    format!(
        r#"<table><tr><td><div class="lineno">{line}</div></td><td><pre><mark>{code}</mark></pre></td></tr></table>"#
    )
}

/// Serves `total` results at 10 per page. Page `p` holds files spread over
/// three repositories; `fail_on` makes that page return a provider error.
struct ScriptedProvider {
    total: u64,
    fail_on: Option<u32>,
    calls: RefCell<Vec<(u32, SearchArgs)>>,
}

impl ScriptedProvider {
    fn new(total: u64) -> Self {
        Self {
            total,
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn failing_on(total: u64, page: u32) -> Self {
        Self {
            fail_on: Some(page),
            ..Self::new(total)
        }
    }

    fn pages_requested(&self) -> Vec<u32> {
        self.calls.borrow().iter().map(|(p, _)| *p).collect()
    }
}

impl SearchProvider for ScriptedProvider {
    fn fetch_raw_page(&self, page: u32, args: &SearchArgs) -> Result<RawPage, BridgeError> {
        self.calls.borrow_mut().push((page, args.clone()));
        if self.fail_on == Some(page) {
            return Err(BridgeError::SearchProvider {
                status: Some(503),
                message: "upstream unavailable".to_string(),
            });
        }
        let first = u64::from(page - 1) * RESULTS_PER_PAGE;
        let hits = (first..self.total.min(first + RESULTS_PER_PAGE))
            .map(|i| RawHit {
                repository: format!("org/repo{}", i % 3),
                path: format!("src/file{}.rs", i),
                snippet: snippet((i + 1) as u32, &args.query),
            })
            .collect();
        Ok(RawPage {
            total: self.total,
            hits,
        })
    }
}

fn fast_pager(provider: &dyn SearchProvider) -> SearchPager<'_> {
    SearchPager::new(provider).with_page_delay(Duration::ZERO)
}

fn no_progress() -> impl FnMut(SearchProgress) {
    |_| {}
}

// ─── SearchArgs ─────────────────────────────────────────────────────

#[test]
fn test_query_params_minimal() {
    let params = SearchArgs::new("import React").query_params(3);
    assert_eq!(
        params,
        vec![("q", "import React".to_string()), ("page", "3".to_string())]
    );
}

#[test]
fn test_query_params_all_flags() {
    let args = SearchArgs {
        query: "fn main".to_string(),
        case_sensitive: true,
        use_regex: true,
        whole_words: false,
        repo_filter: Some("^tokio-rs/".to_string()),
        path_filter: Some("\\.rs$".to_string()),
        languages: vec!["Rust".to_string(), " TOML ".to_string(), "".to_string()],
    };
    let params = args.query_params(1);
    assert!(params.contains(&("case", "true".to_string())));
    assert!(params.contains(&("regexp", "true".to_string())));
    assert!(!params.iter().any(|(k, _)| *k == "words"));
    assert!(params.contains(&("f.repo.pattern", "^tokio-rs/".to_string())));
    assert!(params.contains(&("f.path.pattern", "\\.rs$".to_string())));
    assert!(params.contains(&("f.lang", "Rust,TOML".to_string())));
}

#[test]
fn test_query_params_whole_words() {
    let args = SearchArgs {
        whole_words: true,
        ..SearchArgs::new("Router")
    };
    assert!(args.query_params(1).contains(&("words", "true".to_string())));
}

#[test]
fn test_validate_rejects_regex_with_whole_words() {
    let args = SearchArgs {
        use_regex: true,
        whole_words: true,
        ..SearchArgs::new("x")
    };
    assert!(matches!(args.validate(), Err(BridgeError::InvalidArgs(_))));
}

#[test]
fn test_validate_rejects_empty_query() {
    assert!(SearchArgs::new("   ").validate().is_err());
}

#[test]
fn test_validate_rejects_query_too_long_to_cache() {
    assert!(SearchArgs::new("q".repeat(MAX_QUERY_BYTES)).validate().is_ok());
    assert!(matches!(
        SearchArgs::new("q".repeat(MAX_QUERY_BYTES + 1)).validate(),
        Err(BridgeError::InvalidArgs(_))
    ));
}

#[test]
fn test_validate_rejects_bad_filter_regex() {
    let args = SearchArgs {
        path_filter: Some("[unclosed".to_string()),
        ..SearchArgs::new("x")
    };
    assert!(matches!(args.validate(), Err(BridgeError::InvalidRegex { .. })));
}

// ─── Response decoding ──────────────────────────────────────────────

#[test]
fn test_parse_search_response() {
    let body = r#"{
        "time": 42,
        "facets": {"lang": {"buckets": []}},
        "hits": {
            "total": 2,
            "hits": [
                {"repo": {"raw": "benwis/tower-governor"}, "path": {"raw": "src/lib.rs"},
                 "content": {"snippet": "<table></table>"}},
                {"repo": {"raw": "tokio-rs/axum"}, "path": {"raw": "README.md"}}
            ]
        }
    }"#;
    let page = parse_search_response(body).unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.hits.len(), 2);
    assert_eq!(page.hits[0].repository, "benwis/tower-governor");
    assert_eq!(page.hits[0].snippet, "<table></table>");
    assert_eq!(page.hits[1].snippet, "");
}

#[test]
fn test_parse_search_response_without_hits() {
    let page = parse_search_response("{}").unwrap();
    assert_eq!(page, RawPage::default());
}

#[test]
fn test_parse_search_response_invalid_json() {
    assert!(matches!(parse_search_response("<html>"), Err(BridgeError::Json(_))));
}

#[test]
fn test_truncate_body() {
    assert_eq!(truncate_body("  short  "), "short");
    let long = "é".repeat(400);
    let cut = truncate_body(&long);
    assert!(cut.ends_with("..."));
    assert!(cut.len() <= MAX_ERROR_BODY + 3);
}

// ─── fetch_page ─────────────────────────────────────────────────────

#[test]
fn test_fetch_page_next_page_computation() {
    let provider = ScriptedProvider::new(25);
    let pager = fast_pager(&provider);
    let args = SearchArgs::new("q");
    assert_eq!(pager.fetch_page(1, &args).unwrap().next_page, Some(2));
    assert_eq!(pager.fetch_page(2, &args).unwrap().next_page, Some(3));
    assert_eq!(pager.fetch_page(3, &args).unwrap().next_page, None);

    let exact = ScriptedProvider::new(30);
    assert_eq!(fast_pager(&exact).fetch_page(3, &args).unwrap().next_page, None);

    let none = ScriptedProvider::new(0);
    let page = fast_pager(&none).fetch_page(1, &args).unwrap();
    assert_eq!(page.next_page, None);
    assert!(page.hits.is_empty());
}

#[test]
fn test_fetch_page_parses_snippets() {
    let provider = ScriptedProvider::new(3);
    let page = fast_pager(&provider).fetch_page(1, &SearchArgs::new("needle")).unwrap();
    assert_eq!(page.total_count, 3);
    assert_eq!(page.hits.file_count(), 3);
    assert_eq!(page.hits.lines("org/repo0", "src/file0.rs").unwrap()["1"], "needle");
}

#[test]
fn test_fetch_page_propagates_provider_error() {
    let provider = ScriptedProvider::failing_on(25, 1);
    let err = fast_pager(&provider).fetch_page(1, &SearchArgs::new("q")).unwrap_err();
    assert!(matches!(err, BridgeError::SearchProvider { status: Some(503), .. }));
}

// ─── search ─────────────────────────────────────────────────────────

#[test]
fn test_search_fetches_until_no_next_page() {
    let provider = ScriptedProvider::new(25);
    let results = fast_pager(&provider)
        .search(&SearchArgs::new("import React"), &mut no_progress())
        .unwrap();
    assert_eq!(provider.pages_requested(), vec![1, 2, 3]);
    assert_eq!(results.pages_fetched, 3);
    assert_eq!(results.total_count, 25);
    assert_eq!(results.hits.file_count(), 25);
}

#[test]
fn test_search_single_page() {
    let provider = ScriptedProvider::new(4);
    let results = fast_pager(&provider)
        .search(&SearchArgs::new("q"), &mut no_progress())
        .unwrap();
    assert_eq!(provider.pages_requested(), vec![1]);
    assert_eq!(results.hits.file_count(), 4);
}

#[test]
fn test_search_stops_at_page_ceiling() {
    let provider = ScriptedProvider::new(50_000);
    let results = fast_pager(&provider)
        .search(&SearchArgs::new("import React"), &mut no_progress())
        .unwrap();
    assert_eq!(results.pages_fetched, MAX_PAGES);
    assert_eq!(provider.pages_requested().last(), Some(&MAX_PAGES));
    assert_eq!(results.total_count, 50_000);
}

#[test]
fn test_search_respects_configured_max_pages() {
    let provider = ScriptedProvider::new(500);
    let results = fast_pager(&provider)
        .with_max_pages(4)
        .search(&SearchArgs::new("q"), &mut no_progress())
        .unwrap();
    assert_eq!(provider.pages_requested(), vec![1, 2, 3, 4]);
    assert_eq!(results.hits.file_count(), 40);
}

#[test]
fn test_merged_hits_cover_every_single_page() {
    let provider = ScriptedProvider::new(35);
    let pager = fast_pager(&provider);
    let args = SearchArgs::new("q");
    let merged = pager.search(&args, &mut no_progress()).unwrap();
    for page in 1..=4 {
        let single = pager.fetch_page(page, &args).unwrap();
        assert!(merged.hits.hit_count() >= single.hits.hit_count());
        for (repo, path, _) in single.hits.files() {
            assert!(merged.hits.lines(repo, path).is_some());
        }
    }
}

#[test]
fn test_progress_is_monotonic_and_capped() {
    let provider = ScriptedProvider::new(2_000);
    let mut seen = Vec::new();
    fast_pager(&provider)
        .search(&SearchArgs::new("q"), &mut |p| seen.push(p))
        .unwrap();
    assert_eq!(seen.len(), MAX_PAGES as usize);
    assert!(seen.windows(2).all(|w| w[0].received <= w[1].received));
    assert!(seen.iter().all(|p| p.cap == PROVIDER_RESULT_CEILING));
    assert_eq!(seen.last().unwrap().received, PROVIDER_RESULT_CEILING);
}

#[test]
fn test_pacing_delay_between_pages() {
    let provider = ScriptedProvider::new(30);
    let delay = Duration::from_millis(20);
    let start = Instant::now();
    SearchPager::new(&provider)
        .with_page_delay(delay)
        .search(&SearchArgs::new("q"), &mut no_progress())
        .unwrap();
    // Three pages, two gaps.
    assert!(start.elapsed() >= delay * 2);
}

#[test]
fn test_search_error_on_later_page_propagates() {
    let provider = ScriptedProvider::failing_on(50, 3);
    let err = fast_pager(&provider)
        .search(&SearchArgs::new("q"), &mut no_progress())
        .unwrap_err();
    assert!(matches!(err, BridgeError::SearchProvider { .. }));
    assert_eq!(provider.pages_requested(), vec![1, 2, 3]);
}

#[test]
fn test_flags_reach_every_page() {
    let provider = ScriptedProvider::new(15);
    let args = SearchArgs {
        case_sensitive: true,
        languages: vec!["Rust".to_string()],
        ..SearchArgs::new("q")
    };
    fast_pager(&provider).search(&args, &mut no_progress()).unwrap();
    assert!(provider.calls.borrow().iter().all(|(_, a)| *a == args));
}

// ─── search_and_cache ───────────────────────────────────────────────

#[test]
fn test_search_and_cache_is_discoverable_by_query() {
    let tmp = TempDir::new().unwrap();
    let cache = ResultCache::new(tmp.path());
    let provider = ScriptedProvider::new(12);
    let pager = fast_pager(&provider);

    let results = search_and_cache(&pager, &cache, &SearchArgs::new("tower_governor"), &mut no_progress()).unwrap();

    let keys = cache.find_by_query("tower_governor");
    assert_eq!(keys, vec![cache_key("tower_governor")]);
    assert_eq!(cache.get(&keys[0]).unwrap().data, results);
}

#[test]
fn test_search_and_cache_key_ignores_flags() {
    let tmp = TempDir::new().unwrap();
    let cache = ResultCache::new(tmp.path());
    let provider = ScriptedProvider::new(5);
    let pager = fast_pager(&provider);

    let plain = SearchArgs::new("Router");
    let flagged = SearchArgs {
        case_sensitive: true,
        whole_words: true,
        repo_filter: Some("tokio".to_string()),
        languages: vec!["Rust".to_string()],
        ..SearchArgs::new("Router")
    };
    search_and_cache(&pager, &cache, &plain, &mut no_progress()).unwrap();
    search_and_cache(&pager, &cache, &flagged, &mut no_progress()).unwrap();

    assert_eq!(cache.list().len(), 1);
    assert_eq!(cache.find_by_query("Router"), vec![cache_key("Router")]);
}

#[test]
fn test_search_and_cache_survives_cache_write_failure() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, "file in the way").unwrap();
    let cache = ResultCache::new(&blocker);
    let provider = ScriptedProvider::new(3);

    let results = search_and_cache(&fast_pager(&provider), &cache, &SearchArgs::new("q"), &mut no_progress());
    assert_eq!(results.unwrap().hits.file_count(), 3);
}
