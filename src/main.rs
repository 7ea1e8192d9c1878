//! grep.app search bridge with result caching and GitHub file retrieval.
//!
//! Binary crate entry point. All CLI logic is in the `cli` module.

// mimalloc returns freed pages to the OS promptly, which keeps a long-running
// `serve` process small between large searches.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// Re-export core types from library crate
pub use grep_bridge::{HitStore, LineMap, NumberedHit, SearchResults, cache_key, parse_snippet};

mod cache;
mod cli;
mod error;
mod format;
mod hosting;
mod locate;
mod mcp;
mod provider;

pub use error::BridgeError;

fn main() {
    cli::run();
}
