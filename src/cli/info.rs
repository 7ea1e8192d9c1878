//! cache-info and cleanup commands.

use crate::cache::{EntryHeader, ResultCache, now_ms};
use crate::error::BridgeError;

use super::args::{BridgeConfig, CacheArgs};

pub fn cmd_cache_info(args: CacheArgs) -> Result<(), BridgeError> {
    let cache = BridgeConfig::from(&args.bridge).cache();
    let dir = cache.root();
    if !dir.exists() {
        eprintln!("No cache found. Run 'grep-bridge search <query>' to create one.");
        return Ok(());
    }

    eprintln!("Cache directory: {}", dir.display());
    eprintln!();

    let headers = cache.list();
    if headers.is_empty() {
        eprintln!("No cached searches.");
        return Ok(());
    }

    let now = now_ms();
    let mut total_bytes = 0u64;
    for header in &headers {
        total_bytes += header.file_bytes;
        println!("{}", describe_entry(&cache, header, now));
    }
    eprintln!();
    eprintln!(
        "{} entries, {:.1} MB of {:.1} MB cap, TTL {}h",
        headers.len(),
        total_bytes as f64 / 1_048_576.0,
        cache.max_bytes() as f64 / 1_048_576.0,
        cache.ttl().as_secs() / 3600
    );
    Ok(())
}

/// One line per entry. Expired entries are shown without loading them, since
/// reading one deletes it.
fn describe_entry(cache: &ResultCache, header: &EntryHeader, now: u64) -> String {
    let age_hours = now.saturating_sub(header.timestamp_ms) as f64 / 3_600_000.0;
    let size_kb = header.file_bytes as f64 / 1024.0;
    if cache.is_expired(header.timestamp_ms) {
        return format!(
            "  [EXPIRED] \"{}\" -- {:.1} KB, {:.1}h ago ({})",
            header.query, size_kb, age_hours, header.key
        );
    }
    match cache.get(&header.key) {
        Some(entry) => format!(
            "  \"{}\" -- {} repos, {} files, {} lines, {} total matches, {} pages, {:.1} KB, {:.1}h ago ({})",
            header.query,
            entry.data.hits.repository_count(),
            entry.data.hits.file_count(),
            entry.data.hits.hit_count(),
            entry.data.total_count,
            entry.data.pages_fetched,
            size_kb,
            age_hours,
            header.key
        ),
        None => format!("  [UNREADABLE] \"{}\" ({})", header.query, header.key),
    }
}

pub fn cmd_cleanup(args: CacheArgs) -> Result<(), BridgeError> {
    let cache = BridgeConfig::from(&args.bridge).cache();
    eprintln!("Cleaning cache in {}...", cache.root().display());

    let expired = cache.purge_expired();
    let report = cache.cleanup()?;
    let evicted = report.removed;

    if expired == 0 && evicted == 0 {
        eprintln!("Nothing to remove.");
    } else {
        eprintln!(
            "Removed {} expired and {} over-cap entries ({:.1} MB -> {:.1} MB).",
            expired,
            evicted,
            report.bytes_before as f64 / 1_048_576.0,
            report.bytes_after as f64 / 1_048_576.0
        );
    }
    Ok(())
}
