//! Result cache: one LZ4-compressed bincode record per query.
//!
//! Records live under the cache root as `<key>.grep-cache`, where `key` is
//! [`cache_key`] of the query. The digest cannot be reversed, so every record
//! carries its original query as the first serialized field; reverse lookup
//! decodes just that prefix instead of the whole record.
//!
//! ## Module isolation
//!
//! Depends only on `std`, serde/bincode/lz4 and the library data model.
//! Nothing here talks to the network or knows about tool calls.

use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use grep_bridge::{cache_key, SearchResults};

use crate::error::BridgeError;

// ─── Constants ──────────────────────────────────────────────────────

/// Magic bytes identifying a cache record. Bump when the layout changes.
pub const CACHE_MAGIC: &[u8; 4] = b"GBC1";

/// File extension of cache records.
pub const CACHE_EXT: &str = "grep-cache";

/// Entries older than this are treated as missing and removed on read.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Total on-disk size above which cleanup evicts oldest records.
pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// Longest query a record can carry. Header reads refuse anything longer,
/// so writes refuse it too.
pub const MAX_QUERY_BYTES: usize = 64 * 1024;

// ─── Types ──────────────────────────────────────────────────────────

/// A persisted search result.
///
/// Field order is part of the file format: `query` then `timestamp_ms` must
/// stay first so [`read_entry_header`] can read them without decoding `data`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Original query exactly as the caller typed it.
    pub query: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Serialized byte size of `data`.
    pub size: u64,
    pub data: SearchResults,
}

/// Borrowing twin of [`CacheEntry`] used for writing. Same bincode layout.
#[derive(Serialize)]
struct CacheEntryRef<'a> {
    query: &'a str,
    timestamp_ms: u64,
    size: u64,
    data: &'a SearchResults,
}

/// What [`ResultCache::list`] knows about a record without fully decoding it.
#[derive(Clone, Debug)]
pub struct EntryHeader {
    pub key: String,
    pub query: String,
    pub timestamp_ms: u64,
    pub file_bytes: u64,
}

/// Outcome of a size-cap cleanup pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub removed: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Handle to a cache directory. Cheap to construct; holds no open files.
#[derive(Clone, Debug)]
pub struct ResultCache {
    root: PathBuf,
    ttl: Duration,
    max_bytes: u64,
}

// ─── Paths and clocks ───────────────────────────────────────────────

/// Default production cache directory: `<user cache dir>/grep-bridge`.
/// Tests should NOT use this; pass a temp directory instead.
pub fn default_cache_dir() -> PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("grep-bridge")
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Keys are lowercase hex digests; anything else never names a record.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_hexdigit())
}

// ─── ResultCache ────────────────────────────────────────────────────

impl ResultCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_limits(root, DEFAULT_TTL, DEFAULT_MAX_BYTES)
    }

    pub fn with_limits(root: impl Into<PathBuf>, ttl: Duration, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            ttl,
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Key for `query`. Delegates to the single crate-wide derivation.
    pub fn generate_key(query: &str) -> String {
        cache_key(query)
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        is_valid_key(key).then(|| self.root.join(format!("{}.{}", key, CACHE_EXT)))
    }

    pub(crate) fn is_expired(&self, timestamp_ms: u64) -> bool {
        let age = Duration::from_millis(now_ms().saturating_sub(timestamp_ms));
        age > self.ttl
    }

    /// Read the entry stored under `key`.
    ///
    /// Missing, unreadable and corrupt records all read as `None`. An expired
    /// record also reads as `None` and is deleted.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key)?;
        let entry: CacheEntry = match load_compressed(&path) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache miss");
                return None;
            }
        };

        if self.is_expired(entry.timestamp_ms) {
            remove_if_present(&path);
            debug!(key = %key, query = %entry.query, "Removed expired cache entry");
            return None;
        }
        Some(entry)
    }

    /// Persist `data` under `key`, stamped with the current time and `query`,
    /// then run a cleanup pass. Cleanup failures are logged, not returned.
    pub fn put(&self, key: &str, data: &SearchResults, query: &str) -> Result<(), BridgeError> {
        self.put_at(key, data, query, now_ms())
    }

    pub(crate) fn put_at(
        &self,
        key: &str,
        data: &SearchResults,
        query: &str,
        timestamp_ms: u64,
    ) -> Result<(), BridgeError> {
        let path = self
            .path_for(key)
            .ok_or_else(|| BridgeError::InvalidArgs(format!("Invalid cache key '{}'", key)))?;
        if query.len() > MAX_QUERY_BYTES {
            return Err(BridgeError::InvalidArgs(format!(
                "Query is {} bytes; cached queries are limited to {} bytes",
                query.len(),
                MAX_QUERY_BYTES
            )));
        }
        fs::create_dir_all(&self.root)?;

        let entry = CacheEntryRef {
            query,
            timestamp_ms,
            size: bincode::serialized_size(data)?,
            data,
        };
        save_compressed(&path, &entry)?;

        if let Err(e) = self.cleanup() {
            warn!(error = %e, "Cache cleanup failed after write");
        }
        Ok(())
    }

    /// Keys of every record whose stored query equals `query` exactly,
    /// newest first by stored timestamp (ties broken by key).
    pub fn find_by_query(&self, query: &str) -> Vec<String> {
        let mut matches: Vec<(u64, String)> = self
            .headers()
            .into_iter()
            .filter(|h| h.query == query)
            .map(|h| (h.timestamp_ms, h.key))
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        matches.into_iter().map(|(_, key)| key).collect()
    }

    /// Headers of all readable records, sorted by key.
    pub fn list(&self) -> Vec<EntryHeader> {
        let mut headers = self.headers();
        headers.sort_by(|a, b| a.key.cmp(&b.key));
        headers
    }

    fn headers(&self) -> Vec<EntryHeader> {
        let Ok(dir) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for entry in dir.flatten() {
            let path = entry.path();
            let Some(key) = record_key(&path) else {
                continue;
            };
            // Records may vanish under a concurrent cleanup; skip them.
            let Some((query, timestamp_ms)) = read_entry_header(&path) else {
                continue;
            };
            let file_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            out.push(EntryHeader {
                key,
                query,
                timestamp_ms,
                file_bytes,
            });
        }
        out
    }

    /// Enforce the size cap: when the records' total on-disk size exceeds
    /// `max_bytes`, delete records oldest-first by modification time until
    /// the total is back under the cap.
    pub fn cleanup(&self) -> Result<CleanupReport, BridgeError> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CleanupReport::default()),
            Err(e) => return Err(e.into()),
        };

        let mut records: Vec<(SystemTime, PathBuf, u64)> = Vec::new();
        for entry in dir.flatten() {
            let path = entry.path();
            if record_key(&path).is_none() {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping cache record during cleanup");
                    continue;
                }
            };
            let modified = meta.modified().unwrap_or(UNIX_EPOCH);
            records.push((modified, path, meta.len()));
        }

        Ok(evict_oldest(records, self.max_bytes))
    }

    /// Delete every expired record. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        for header in self.headers() {
            if !self.is_expired(header.timestamp_ms) {
                continue;
            }
            if let Some(path) = self.path_for(&header.key) {
                if remove_if_present(&path) {
                    removed += 1;
                    debug!(key = %header.key, query = %header.query, "Purged expired cache entry");
                }
            }
        }
        removed
    }
}

/// Key of a cache record path, or `None` when the path is not a record.
fn record_key(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(CACHE_EXT) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    is_valid_key(stem).then(|| stem.to_string())
}

/// Remove a file, treating "already gone" as success. Returns true if this
/// call removed it.
fn remove_if_present(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove cache file");
            false
        }
    }
}

// ─── LZ4 record I/O ─────────────────────────────────────────────────

/// Write magic bytes then an LZ4 frame of bincode data. The record is
/// written to a sibling temp file and renamed into place, so readers see
/// either the old record or the new one.
fn save_compressed<T: Serialize>(path: &Path, data: &T) -> Result<(), BridgeError> {
    let start = Instant::now();
    let tmp = path.with_extension(format!("{}.tmp", std::process::id()));

    let result = (|| -> Result<(), BridgeError> {
        let file = fs::File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(CACHE_MAGIC)?;
        let mut encoder = lz4_flex::frame::FrameEncoder::new(writer);
        bincode::serialize_into(&mut encoder, data)?;
        let mut writer = encoder.finish().map_err(std::io::Error::other)?;
        writer.flush()?;
        Ok(())
    })();
    if let Err(e) = result {
        remove_if_present(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;

    debug!(
        path = %path.display(),
        bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
        "Saved cache entry"
    );
    Ok(())
}

/// Load a record written by [`save_compressed`].
fn load_compressed<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, BridgeError> {
    let path_str = path.display().to_string();
    let file = fs::File::open(path).map_err(|e| BridgeError::CacheLoad {
        path: path_str.clone(),
        message: format!("cannot open file: {}", e),
    })?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(|e| BridgeError::CacheLoad {
        path: path_str.clone(),
        message: format!("read error (magic bytes): {}", e),
    })?;
    if &magic != CACHE_MAGIC {
        return Err(BridgeError::CacheLoad {
            path: path_str,
            message: "not a cache record (bad magic bytes)".to_string(),
        });
    }

    let decoder = lz4_flex::frame::FrameDecoder::new(reader);
    bincode::deserialize_from(decoder).map_err(|e| BridgeError::CacheLoad {
        path: path_str,
        message: format!("LZ4 deserialization failed: {}", e),
    })
}

/// Delete `records` (mtime, path, bytes) oldest-first until their total is
/// within `max_bytes`. A record that is already gone counts as removed by
/// someone else: its bytes leave the total but `removed` is not bumped.
pub(crate) fn evict_oldest(mut records: Vec<(SystemTime, PathBuf, u64)>, max_bytes: u64) -> CleanupReport {
    let total: u64 = records.iter().map(|(_, _, len)| len).sum();
    let mut report = CleanupReport {
        scanned: records.len(),
        removed: 0,
        bytes_before: total,
        bytes_after: total,
    };
    if total <= max_bytes {
        return report;
    }

    records.sort();
    for (_, path, len) in records {
        if report.bytes_after <= max_bytes {
            break;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                report.removed += 1;
                report.bytes_after -= len;
                info!(path = %path.display(), bytes = len, "Evicted cache entry");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Cache entry already gone");
                report.bytes_after -= len;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to evict cache entry");
            }
        }
    }
    report
}

/// Read `(query, timestamp_ms)` from a record without decoding the payload.
///
/// Bincode stores a String as a u64 length followed by UTF-8 bytes, then the
/// u64 timestamp. Both sit at the start of the LZ4 frame.
pub(crate) fn read_entry_header(path: &Path) -> Option<(String, u64)> {
    let mut file = fs::File::open(path).ok()?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).ok()?;
    if &magic != CACHE_MAGIC {
        return None;
    }
    let mut reader = lz4_flex::frame::FrameDecoder::new(BufReader::new(file));

    let mut u64_buf = [0u8; 8];
    reader.read_exact(&mut u64_buf).ok()?;
    let len = u64::from_le_bytes(u64_buf) as usize;
    if len > MAX_QUERY_BYTES {
        return None;
    }
    let mut str_buf = vec![0u8; len];
    reader.read_exact(&mut str_buf).ok()?;
    let query = String::from_utf8(str_buf).ok()?;

    reader.read_exact(&mut u64_buf).ok()?;
    Some((query, u64::from_le_bytes(u64_buf)))
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
