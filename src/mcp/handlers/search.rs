//! grep_query handler.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use crate::format::{OutputFormat, render_results};
use crate::mcp::protocol::ToolCallResult;
use crate::provider::{SearchArgs, SearchProgress, search_and_cache};

use super::HandlerContext;
use super::utils::{arg_bool, arg_opt_string, arg_str, arg_string_list, error_result};

/// Build `SearchArgs` from tool arguments and validate them.
pub(crate) fn search_args_from_json(args: &Value) -> Result<SearchArgs, String> {
    let query = match arg_str(args, "query") {
        Some(q) => q.to_string(),
        None => return Err("Missing required parameter: query".to_string()),
    };
    let search = SearchArgs {
        query,
        case_sensitive: arg_bool(args, "caseSensitive"),
        use_regex: arg_bool(args, "useRegex"),
        whole_words: arg_bool(args, "wholeWords"),
        repo_filter: arg_opt_string(args, "repoFilter"),
        path_filter: arg_opt_string(args, "pathFilter"),
        languages: arg_string_list(args, "langFilter"),
    };
    search.validate().map_err(|e| e.to_string())?;
    Ok(search)
}

pub(crate) fn handle_grep_query(ctx: &HandlerContext, args: &Value) -> ToolCallResult {
    let search = match search_args_from_json(args) {
        Ok(s) => s,
        Err(msg) => return ToolCallResult::error(msg),
    };
    let format = match arg_str(args, "outputFormat") {
        Some(f) => match f.parse::<OutputFormat>() {
            Ok(format) => format,
            Err(e) => return error_result(&e),
        },
        None => OutputFormat::default(),
    };

    let start = Instant::now();
    let pager = ctx.pager();
    let mut on_progress = |p: SearchProgress| {
        debug!(pages = p.pages_fetched, received = p.received, cap = p.cap, "Search progress");
    };
    let results = match search_and_cache(&pager, &ctx.cache, &search, &mut on_progress) {
        Ok(r) => r,
        Err(e) => return error_result(&e),
    };
    info!(
        query = %search.query,
        files = results.hits.file_count(),
        elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
        "grep_query served"
    );

    match render_results(&search.query, &results, format) {
        Ok(text) => ToolCallResult::success(text),
        Err(e) => error_result(&e),
    }
}
