//! MCP tool handlers: tool definitions and dispatch to the search and fetch
//! handler modules.

mod fetch;
mod search;
pub(crate) mod utils;

use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use crate::cache::ResultCache;
use crate::hosting::FileHost;
use crate::mcp::protocol::{ToolCallResult, ToolDefinition};
use crate::provider::{SearchPager, SearchProvider};

/// Return all tool definitions for tools/list
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "grep_query".to_string(),
            description: "Search public GitHub code through grep.app. Fetches ALL result pages (10 results per page, up to 1000 results), merges them and caches the merged set for 24 hours under this exact query. Output lists each matching file with its highlighted lines. In the default 'numbered' format every file gets a number; pass those numbers with the same query to grep_fetch_files to download the files.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search text, or a regular expression when useRegex=true"
                    },
                    "caseSensitive": {
                        "type": "boolean",
                        "description": "Match case exactly (default: false)"
                    },
                    "useRegex": {
                        "type": "boolean",
                        "description": "Treat query as a regular expression (default: false). Cannot be combined with wholeWords."
                    },
                    "wholeWords": {
                        "type": "boolean",
                        "description": "Match whole words only (default: false)"
                    },
                    "repoFilter": {
                        "type": "string",
                        "description": "Regex over 'owner/repo', e.g. '^tokio-rs/'"
                    },
                    "pathFilter": {
                        "type": "string",
                        "description": "Regex over the file path, e.g. '\\.rs$'"
                    },
                    "langFilter": {
                        "description": "Language names, as an array or a comma-separated string, e.g. ['Rust','Go'] or 'Rust,Go'",
                        "anyOf": [
                            { "type": "array", "items": { "type": "string" } },
                            { "type": "string" }
                        ]
                    },
                    "outputFormat": {
                        "type": "string",
                        "enum": ["plain", "numbered", "json"],
                        "description": "'numbered' (default) prints files with the numbers grep_fetch_files accepts; 'plain' groups by repository; 'json' returns structured data."
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "grep_fetch_files".to_string(),
            description: "Download files from a previous grep_query result set. Use the same query string and the result numbers printed by grep_query. Omit resultNumbers to fetch every file (use page/pageSize to take them in slices). Files are fetched from GitHub in parallel; a failure for one file is reported next to it without failing the rest. Fails with a 'no cached results' error if grep_query has not been run for this query in the last 24 hours. Large files are shortened to fit the response limit and marked truncated.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The exact query previously passed to grep_query"
                    },
                    "resultNumbers": {
                        "type": "array",
                        "items": { "type": "integer", "minimum": 1 },
                        "description": "1-based result numbers from grep_query output. Unknown numbers are skipped and listed in the summary."
                    },
                    "page": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "1-based page over the selected results (default page size: 10)"
                    },
                    "pageSize": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Results per page"
                    },
                    "ref": {
                        "type": "string",
                        "description": "Branch, tag or commit to fetch (default: repository default branch)"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "github_fetch_file".to_string(),
            description: "Fetch one file's content from a public GitHub repository.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "repository": {
                        "type": "string",
                        "description": "Repository as 'owner/name'"
                    },
                    "path": {
                        "type": "string",
                        "description": "File path inside the repository"
                    },
                    "ref": {
                        "type": "string",
                        "description": "Branch, tag or commit (default: repository default branch)"
                    }
                },
                "required": ["repository", "path"]
            }),
        },
    ]
}

/// Context for tool handlers: the collaborators and limits a call runs with.
pub struct HandlerContext {
    pub provider: Box<dyn SearchProvider>,
    pub host: Box<dyn FileHost>,
    pub cache: ResultCache,
    /// Delay between consecutive page fetches.
    pub page_delay: Duration,
    pub max_pages: u32,
    /// Maximum response size in bytes before truncation kicks in. 0 = no limit.
    pub max_response_bytes: usize,
}

impl HandlerContext {
    pub(crate) fn pager(&self) -> SearchPager<'_> {
        SearchPager::new(self.provider.as_ref())
            .with_page_delay(self.page_delay)
            .with_max_pages(self.max_pages)
    }
}

/// Dispatch a tool call to the right handler.
pub fn dispatch_tool(ctx: &HandlerContext, tool_name: &str, arguments: &Value) -> ToolCallResult {
    debug!(tool = %tool_name, "Dispatching tool call");
    let result = match tool_name {
        "grep_query" => search::handle_grep_query(ctx, arguments),
        "grep_fetch_files" => fetch::handle_grep_fetch_files(ctx, arguments),
        "github_fetch_file" => fetch::handle_github_fetch_file(ctx, arguments),
        _ => return ToolCallResult::error(format!("Unknown tool: {}", tool_name)),
    };

    // grep_fetch_files fits its JSON to the limit itself; a byte cut would break it.
    if result.is_error || tool_name == "grep_fetch_files" {
        return result;
    }
    utils::truncate_response_if_needed(result, ctx.max_response_bytes)
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
