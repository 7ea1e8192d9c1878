//! The aggregate: repository → file path → line number → matched line.
//!
//! Nested `BTreeMap`s keep traversal order lexicographic, so flattening the
//! same content always yields the same numbering. That numbering is what a
//! caller quotes back when asking for files from a cached result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snippet::parse_snippet;

/// Line number (as rendered text) → line content.
pub type LineMap = BTreeMap<String, String>;

/// Merged search hits across one or more result pages.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct HitStore {
    repos: BTreeMap<String, BTreeMap<String, LineMap>>,
}

/// One file-level entry of a flattened aggregate, numbered from 1.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumberedHit {
    pub number: usize,
    pub repository: String,
    pub path: String,
}

impl HitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `snippet_html` and merge its highlighted lines under
    /// `repository`/`path`. Returns the number of lines taken from the snippet.
    ///
    /// A snippet without highlighted rows still registers the file, since the
    /// provider reported it as a hit.
    pub fn add_hit(&mut self, repository: &str, path: &str, snippet_html: &str) -> usize {
        let lines = parse_snippet(snippet_html);
        let count = lines.len();
        self.insert_lines(repository, path, lines);
        count
    }

    /// Merge `lines` into `repository`/`path`, overwriting existing line numbers.
    /// Empty repository or path keys are refused.
    pub fn insert_lines(&mut self, repository: &str, path: &str, lines: LineMap) -> bool {
        if repository.is_empty() || path.is_empty() {
            return false;
        }
        self.repos
            .entry(repository.to_string())
            .or_default()
            .entry(path.to_string())
            .or_default()
            .extend(lines);
        true
    }

    /// Deep-union `source` into `self`. On a (repository, path, line)
    /// collision the value from `source` wins.
    pub fn merge(&mut self, source: HitStore) {
        for (repo, files) in source.repos {
            let target_files = self.repos.entry(repo).or_default();
            for (path, lines) in files {
                target_files.entry(path).or_default().extend(lines);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn repository_count(&self) -> usize {
        self.repos.len()
    }

    /// Number of distinct (repository, path) pairs.
    pub fn file_count(&self) -> usize {
        self.repos.values().map(BTreeMap::len).sum()
    }

    /// Number of distinct (repository, path, line) triples.
    pub fn hit_count(&self) -> usize {
        self.repos
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    pub fn lines(&self, repository: &str, path: &str) -> Option<&LineMap> {
        self.repos.get(repository)?.get(path)
    }

    /// Iterate `(repository, path, lines)` in flattening order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &str, &LineMap)> {
        self.repos.iter().flat_map(|(repo, files)| {
            files
                .iter()
                .map(move |(path, lines)| (repo.as_str(), path.as_str(), lines))
        })
    }

    /// Number every file in repository-then-path order, starting at 1.
    pub fn flatten(&self) -> Vec<NumberedHit> {
        self.files()
            .enumerate()
            .map(|(i, (repository, path, _))| NumberedHit {
                number: i + 1,
                repository: repository.to_string(),
                path: path.to_string(),
            })
            .collect()
    }
}

/// Lines of a file sorted by numeric line number; non-numeric keys sort last.
pub fn sorted_lines(lines: &LineMap) -> Vec<(&str, &str)> {
    let mut out: Vec<(&str, &str)> = lines.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    out.sort_by_key(|(k, _)| (k.parse::<u64>().unwrap_or(u64::MAX), *k));
    out
}
