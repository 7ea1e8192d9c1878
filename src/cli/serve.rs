//! MCP server startup and configuration.

use tracing::info;

use crate::error::BridgeError;
use crate::mcp;
use crate::mcp::handlers::HandlerContext;

use super::args::{BridgeConfig, ServeArgs};

pub fn cmd_serve(args: ServeArgs) -> Result<(), BridgeError> {
    let config = BridgeConfig::from(&args.bridge);
    let ctx = build_context(&config, args.max_response_kb)?;

    info!(
        cache_dir = %config.cache_dir.display(),
        search_url = %config.search_url,
        github_api_url = %config.github_api_url,
        max_pages = config.max_pages,
        page_delay_ms = config.page_delay.as_millis() as u64,
        "Starting MCP server"
    );

    let purged = ctx.cache.purge_expired();
    if purged > 0 {
        info!(purged, "Removed expired cache entries at startup");
    }

    mcp::server::run_server(ctx);
    Ok(())
}

fn build_context(config: &BridgeConfig, max_response_kb: usize) -> Result<HandlerContext, BridgeError> {
    Ok(HandlerContext {
        provider: Box::new(config.search_client()?),
        host: Box::new(config.github_client()?),
        cache: config.cache(),
        page_delay: config.page_delay,
        max_pages: config.max_pages,
        max_response_bytes: max_response_kb.saturating_mul(1024),
    })
}
