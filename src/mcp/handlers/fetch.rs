//! grep_fetch_files and github_fetch_file handlers.

use serde_json::Value;
use tracing::info;

use crate::error::BridgeError;
use crate::format::fetched_files_json;
use crate::hosting::{FileRequest, fetch_files};
use crate::locate::{LocateRequest, locate};
use crate::mcp::protocol::ToolCallResult;

use super::HandlerContext;
use super::utils::{
    arg_opt_string, arg_positive, arg_result_numbers, arg_str, error_result, fit_file_contents, json_result,
};

fn locate_request_from_json(args: &Value) -> Result<LocateRequest, BridgeError> {
    Ok(LocateRequest {
        page: arg_positive(args, "page")?,
        page_size: arg_positive(args, "pageSize")?,
        ..LocateRequest::numbers(arg_result_numbers(args, "resultNumbers")?)
    })
}

pub(crate) fn handle_grep_fetch_files(ctx: &HandlerContext, args: &Value) -> ToolCallResult {
    let query = match arg_str(args, "query") {
        Some(q) => q,
        None => return ToolCallResult::error("Missing required parameter: query".to_string()),
    };
    let request = match locate_request_from_json(args) {
        Ok(r) => r,
        Err(e) => return error_result(&e),
    };
    let git_ref = arg_opt_string(args, "ref");

    let outcome = match locate(&ctx.cache, query, &request) {
        Ok(o) => o,
        Err(e) => return error_result(&e),
    };

    let requests: Vec<FileRequest> = outcome
        .hits
        .iter()
        .map(|hit| FileRequest {
            repository: hit.repository.clone(),
            path: hit.path.clone(),
            git_ref: git_ref.clone(),
        })
        .collect();
    let files = fetch_files(ctx.host.as_ref(), requests);
    let failed = files.iter().filter(|f| f.content.is_err()).count();
    info!(query = %query, requested = files.len(), failed, "Fetched files for cached results");

    let mut response = fetched_files_json(&outcome.hits, &files, &outcome.missing, outcome.available);
    let truncated = fit_file_contents(&mut response, ctx.max_response_bytes);
    if truncated > 0 {
        info!(truncated, max_bytes = ctx.max_response_bytes, "Shortened file contents to fit the response limit");
    }
    json_result(&response)
}

pub(crate) fn handle_github_fetch_file(ctx: &HandlerContext, args: &Value) -> ToolCallResult {
    let (repository, path) = match (arg_str(args, "repository"), arg_str(args, "path")) {
        (Some(r), Some(p)) => (r, p),
        _ => return ToolCallResult::error("Missing required parameters: repository, path".to_string()),
    };
    let git_ref = arg_opt_string(args, "ref");
    match ctx.host.fetch_file(repository, path, git_ref.as_deref()) {
        Ok(content) => ToolCallResult::success(content),
        Err(e) => error_result(&e),
    }
}
