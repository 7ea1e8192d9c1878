//! File retrieval from the source-hosting API.
//!
//! [`FileHost`] is the seam; [`GitHubClient`] talks to the GitHub contents
//! API. [`fetch_files`] fans a batch out over scoped threads and returns the
//! results in request order whatever order they complete in.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::provider::{build_http_client, truncate_body};

/// Default API root.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Most requests in flight at once for one batch.
pub const MAX_PARALLEL_FETCHES: usize = 8;

/// One file to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRequest {
    /// `owner/name`
    pub repository: String,
    pub path: String,
    /// Branch, tag or commit; default branch when `None`.
    pub git_ref: Option<String>,
}

/// Outcome of one request in a batch. Failures are per file.
#[derive(Debug)]
pub struct FetchedFile {
    pub request: FileRequest,
    pub content: Result<String, BridgeError>,
}

/// Fetches decoded file contents from a hosting service.
pub trait FileHost: Sync {
    fn fetch_file(&self, repository: &str, path: &str, git_ref: Option<&str>) -> Result<String, BridgeError>;
}

// ─── GitHub ─────────────────────────────────────────────────────────

pub struct GitHubClient {
    client: reqwest::blocking::Client,
    api_base: String,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, BridgeError> {
        Ok(Self {
            client: build_http_client(timeout)?,
            api_base: api_base.into(),
        })
    }

    /// `{api}/repos/{owner}/{name}/contents/{path}[?ref=..]`, each path
    /// segment percent-encoded.
    pub(crate) fn contents_url(&self, repository: &str, path: &str, git_ref: Option<&str>) -> Result<Url, BridgeError> {
        let (owner, name) = split_repository(repository)?;
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(BridgeError::InvalidArgs("File path must not be empty".to_string()));
        }

        let mut url = Url::parse(&self.api_base)
            .map_err(|e| BridgeError::InvalidArgs(format!("Invalid API URL '{}': {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| BridgeError::InvalidArgs(format!("API URL cannot be a base: {}", self.api_base)))?
            .pop_if_empty()
            .extend(["repos", owner, name, "contents"])
            .extend(segments);
        if let Some(r) = git_ref.filter(|r| !r.is_empty()) {
            url.query_pairs_mut().append_pair("ref", r);
        }
        Ok(url)
    }
}

/// Split `owner/name`; anything else is rejected.
pub(crate) fn split_repository(repository: &str) -> Result<(&str, &str), BridgeError> {
    match repository.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok((owner, name)),
        _ => Err(BridgeError::InvalidArgs(format!(
            "Repository must be 'owner/name', got '{}'",
            repository
        ))),
    }
}

impl FileHost for GitHubClient {
    fn fetch_file(&self, repository: &str, path: &str, git_ref: Option<&str>) -> Result<String, BridgeError> {
        let fetch_err = |message: String| BridgeError::FileFetch {
            repository: repository.to_string(),
            path: path.to_string(),
            message,
        };

        let url = self.contents_url(repository, path, git_ref)?;
        debug!(url = %url, "Fetching file");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static("application/vnd.github.raw"))
            .header("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"))
            .send()
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(fetch_err("not found".to_string()));
        }
        let body = response.text().map_err(|e| fetch_err(e.to_string()))?;
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}: {}", status.as_u16(), truncate_body(&body))));
        }
        Ok(body)
    }
}

// ─── Batch fetch ────────────────────────────────────────────────────

/// Fetch every request, at most [`MAX_PARALLEL_FETCHES`] at a time.
/// The returned vector is in the same order as `requests`.
pub fn fetch_files(host: &dyn FileHost, requests: Vec<FileRequest>) -> Vec<FetchedFile> {
    let mut done: Vec<(usize, FetchedFile)> = Vec::with_capacity(requests.len());
    let indexed: Vec<(usize, FileRequest)> = requests.into_iter().enumerate().collect();

    for chunk in indexed.chunks(MAX_PARALLEL_FETCHES) {
        let (tx, rx) = mpsc::channel();
        thread::scope(|scope| {
            for (idx, request) in chunk {
                let tx = tx.clone();
                scope.spawn(move || {
                    let content = fetch_one(host, request);
                    // The receiver outlives the scope.
                    let _ = tx.send((*idx, content));
                });
            }
        });
        drop(tx);

        for (idx, content) in rx {
            let request = chunk[idx - chunk[0].0].1.clone();
            if let Err(e) = &content {
                warn!(repository = %request.repository, path = %request.path, error = %e, "File fetch failed");
            }
            done.push((idx, FetchedFile { request, content }));
        }
    }

    done.sort_by_key(|(idx, _)| *idx);
    done.into_iter().map(|(_, f)| f).collect()
}

/// One fetch, with a panicking host turned into a per-file error so the
/// rest of the batch survives.
fn fetch_one(host: &dyn FileHost, request: &FileRequest) -> Result<String, BridgeError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        host.fetch_file(&request.repository, &request.path, request.git_ref.as_deref())
    }))
    .unwrap_or_else(|_| {
        Err(BridgeError::FileFetch {
            repository: request.repository.clone(),
            path: request.path.clone(),
            message: "fetch worker panicked".to_string(),
        })
    })
}
