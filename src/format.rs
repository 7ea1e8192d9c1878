//! Text and JSON renderings of search aggregates and fetched files.

use std::fmt::Write as _;
use std::str::FromStr;

use grep_bridge::{NumberedHit, SearchResults, hits::sorted_lines};
use serde_json::{Value, json};

use crate::error::BridgeError;
use crate::hosting::FetchedFile;

/// How a search aggregate is shown to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Grouped by repository, then file
    Plain,
    /// Flat list numbered the way `locate` expects
    #[default]
    Numbered,
    /// Machine-readable
    Json,
}

impl FromStr for OutputFormat {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(Self::Plain),
            "numbered" => Ok(Self::Numbered),
            "json" => Ok(Self::Json),
            other => Err(BridgeError::InvalidArgs(format!(
                "Unknown output format '{}' (expected plain, numbered or json)",
                other
            ))),
        }
    }
}

pub fn render_results(query: &str, results: &SearchResults, format: OutputFormat) -> Result<String, BridgeError> {
    match format {
        OutputFormat::Plain => Ok(render_plain(query, results)),
        OutputFormat::Numbered => Ok(render_numbered(query, results)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&results_json(query, results))?),
    }
}

fn summary_line(query: &str, results: &SearchResults) -> String {
    format!(
        "Query: {}\nTotal matches: {} | Files: {} | Lines: {} | Pages fetched: {}\n",
        query,
        results.total_count,
        results.hits.file_count(),
        results.hits.hit_count(),
        results.pages_fetched
    )
}

fn render_plain(query: &str, results: &SearchResults) -> String {
    let mut out = summary_line(query, results);
    if results.hits.is_empty() {
        out.push_str("\nNo results found.\n");
        return out;
    }
    let mut current_repo: Option<&str> = None;
    for (repo, path, lines) in results.hits.files() {
        if current_repo != Some(repo) {
            let _ = writeln!(out, "\nRepository: {}", repo);
            current_repo = Some(repo);
        }
        let _ = writeln!(out, "  /{}", path);
        for (line, code) in sorted_lines(lines) {
            let _ = writeln!(out, "    {}: {}", line, code);
        }
    }
    out
}

fn render_numbered(query: &str, results: &SearchResults) -> String {
    let mut out = summary_line(query, results);
    if results.hits.is_empty() {
        out.push_str("\nNo results found.\n");
        return out;
    }
    for (hit, (_, _, lines)) in results.hits.flatten().iter().zip(results.hits.files()) {
        let _ = writeln!(out, "\n[{}] {}/{}", hit.number, hit.repository, hit.path);
        for (line, code) in sorted_lines(lines) {
            let _ = writeln!(out, "  {}: {}", line, code);
        }
    }
    out.push_str("\nUse these numbers with grep_fetch_files to retrieve file contents.\n");
    out
}

pub fn results_json(query: &str, results: &SearchResults) -> Value {
    let files: Vec<Value> = results
        .hits
        .flatten()
        .iter()
        .zip(results.hits.files())
        .map(|(hit, (_, _, lines))| {
            json!({
                "number": hit.number,
                "repository": hit.repository,
                "path": hit.path,
                "lines": lines,
            })
        })
        .collect();
    json!({
        "query": query,
        "totalCount": results.total_count,
        "pagesFetched": results.pages_fetched,
        "files": files,
    })
}

/// Numbered hits without their lines, one per line.
pub fn render_hit_list(hits: &[NumberedHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(out, "[{}] {}/{}", hit.number, hit.repository, hit.path);
    }
    out
}

/// `[{number, repository, path, content | error}]` plus the numbers that
/// did not resolve. `hits` and `files` are parallel.
pub fn fetched_files_json(hits: &[NumberedHit], files: &[FetchedFile], missing: &[usize], available: usize) -> Value {
    let mut fetched = 0usize;
    let entries: Vec<Value> = hits
        .iter()
        .zip(files)
        .map(|(hit, file)| match &file.content {
            Ok(content) => {
                fetched += 1;
                json!({
                    "number": hit.number,
                    "repository": hit.repository,
                    "path": hit.path,
                    "content": content,
                })
            }
            Err(e) => json!({
                "number": hit.number,
                "repository": hit.repository,
                "path": hit.path,
                "error": e.to_string(),
            }),
        })
        .collect();

    let mut summary = json!({
        "requested": hits.len(),
        "fetched": fetched,
        "failed": hits.len() - fetched,
        "availableResults": available,
    });
    if !missing.is_empty() {
        summary["droppedNumbers"] = json!(missing);
    }
    json!({ "files": entries, "summary": summary })
}

/// Plain-text rendering of a fetched batch for the command line.
pub fn render_fetched(hits: &[NumberedHit], files: &[FetchedFile]) -> String {
    let mut out = String::new();
    for (hit, file) in hits.iter().zip(files) {
        let _ = writeln!(out, "=== [{}] {}/{} ===", hit.number, hit.repository, hit.path);
        match &file.content {
            Ok(content) => {
                out.push_str(content);
                if !content.ends_with('\n') {
                    out.push('\n');
                }
            }
            Err(e) => {
                let _ = writeln!(out, "ERROR: {}", e);
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::FileRequest;
    use grep_bridge::{HitStore, LineMap};

    fn sample() -> SearchResults {
        let mut hits = HitStore::new();
        let mut a = LineMap::new();
        a.insert("10".to_string(), "use tower_governor::GovernorLayer;".to_string());
        a.insert("9".to_string(), "use axum::Router;".to_string());
        hits.insert_lines("benwis/tower-governor", "examples/basic.rs", a);
        let mut b = LineMap::new();
        b.insert("3".to_string(), "tower_governor = \"0.4\"".to_string());
        hits.insert_lines("acme/api", "Cargo.toml", b);
        SearchResults {
            hits,
            total_count: 2,
            pages_fetched: 1,
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Plain);
        assert_eq!(" JSON ".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("numbered".parse::<OutputFormat>().unwrap(), OutputFormat::Numbered);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Numbered);
    }

    #[test]
    fn test_plain_groups_and_sorts_lines_numerically() {
        let text = render_results("tower_governor", &sample(), OutputFormat::Plain).unwrap();
        let repo_a = text.find("Repository: acme/api").unwrap();
        let repo_b = text.find("Repository: benwis/tower-governor").unwrap();
        assert!(repo_a < repo_b);
        let nine = text.find("9: use axum::Router;").unwrap();
        let ten = text.find("10: use tower_governor::GovernorLayer;").unwrap();
        assert!(nine < ten, "line 9 must come before line 10");
    }

    #[test]
    fn test_numbered_matches_flatten() {
        let results = sample();
        let text = render_results("q", &results, OutputFormat::Numbered).unwrap();
        for hit in results.hits.flatten() {
            assert!(text.contains(&format!("[{}] {}/{}", hit.number, hit.repository, hit.path)));
        }
        assert!(text.contains("[1] acme/api/Cargo.toml"));
        assert!(text.contains("[2] benwis/tower-governor/examples/basic.rs"));
    }

    #[test]
    fn test_empty_results_say_so() {
        let empty = SearchResults::default();
        assert!(render_results("q", &empty, OutputFormat::Plain).unwrap().contains("No results found."));
        assert!(render_results("q", &empty, OutputFormat::Numbered).unwrap().contains("No results found."));
    }

    #[test]
    fn test_json_shape() {
        let text = render_results("q", &sample(), OutputFormat::Json).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["query"], "q");
        assert_eq!(v["totalCount"], 2);
        assert_eq!(v["pagesFetched"], 1);
        let files = v["files"].as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["number"], 1);
        assert_eq!(files[0]["repository"], "acme/api");
        assert_eq!(files[0]["lines"]["3"], "tower_governor = \"0.4\"");
    }

    fn fetched(repo: &str, path: &str, content: Result<&str, &str>) -> FetchedFile {
        FetchedFile {
            request: FileRequest {
                repository: repo.to_string(),
                path: path.to_string(),
                git_ref: None,
            },
            content: content.map(str::to_string).map_err(|m| BridgeError::FileFetch {
                repository: repo.to_string(),
                path: path.to_string(),
                message: m.to_string(),
            }),
        }
    }

    #[test]
    fn test_fetched_files_json_mixes_content_and_errors() {
        let hits = vec![
            NumberedHit {
                number: 2,
                repository: "o/r".to_string(),
                path: "a.rs".to_string(),
            },
            NumberedHit {
                number: 1,
                repository: "o/r".to_string(),
                path: "gone.rs".to_string(),
            },
        ];
        let files = vec![fetched("o/r", "a.rs", Ok("fn a() {}")), fetched("o/r", "gone.rs", Err("not found"))];
        let v = fetched_files_json(&hits, &files, &[42], 5);

        assert_eq!(v["files"][0]["number"], 2);
        assert_eq!(v["files"][0]["content"], "fn a() {}");
        assert!(v["files"][0].get("error").is_none());
        assert_eq!(v["files"][1]["number"], 1);
        assert!(v["files"][1]["error"].as_str().unwrap().contains("not found"));
        assert_eq!(v["summary"]["fetched"], 1);
        assert_eq!(v["summary"]["failed"], 1);
        assert_eq!(v["summary"]["droppedNumbers"], json!([42]));
    }

    #[test]
    fn test_render_fetched_and_hit_list() {
        let hits = vec![NumberedHit {
            number: 1,
            repository: "o/r".to_string(),
            path: "a.rs".to_string(),
        }];
        assert_eq!(render_hit_list(&hits), "[1] o/r/a.rs\n");
        let text = render_fetched(&hits, &[fetched("o/r", "a.rs", Ok("fn a() {}"))]);
        assert!(text.starts_with("=== [1] o/r/a.rs ===\nfn a() {}\n"));
    }
}
