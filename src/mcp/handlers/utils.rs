//! Shared utility functions for MCP tool handlers.

use serde_json::{Value, json};

use crate::error::BridgeError;
use crate::mcp::protocol::ToolCallResult;

// ─── Argument helpers ───────────────────────────────────────────────

pub(crate) fn arg_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

/// String argument; `None` when absent or empty.
pub(crate) fn arg_opt_string(args: &Value, name: &str) -> Option<String> {
    arg_str(args, name).filter(|s| !s.is_empty()).map(|s| s.to_string())
}

pub(crate) fn arg_bool(args: &Value, name: &str) -> bool {
    args.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// A string list given either as a JSON array or one comma-separated string.
pub(crate) fn arg_string_list(args: &Value, name: &str) -> Vec<String> {
    match args.get(name) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Optional positive integer argument. Present but not a positive integer
/// is an error.
pub(crate) fn arg_positive(args: &Value, name: &str) -> Result<Option<usize>, BridgeError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 => Ok(Some(n as usize)),
            _ => Err(BridgeError::InvalidArgs(format!("{} must be a positive integer", name))),
        },
    }
}

/// Result numbers as a JSON array of integers (a comma-separated string is
/// also accepted). Absent or empty means "all".
pub(crate) fn arg_result_numbers(args: &Value, name: &str) -> Result<Vec<usize>, BridgeError> {
    let invalid = || BridgeError::InvalidArgs(format!("{} must be an array of positive integers", name));
    match args.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_u64().map(|n| n as usize).ok_or_else(invalid))
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<usize>().map_err(|_| invalid()))
            .collect(),
        Some(_) => Err(invalid()),
    }
}

// ─── Results ────────────────────────────────────────────────────────

pub(crate) fn error_result(err: &BridgeError) -> ToolCallResult {
    ToolCallResult::error(err.to_string())
}

pub(crate) fn json_result(value: &Value) -> ToolCallResult {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ToolCallResult::success(text),
        Err(e) => ToolCallResult::error(format!("Failed to serialize response: {}", e)),
    }
}

/// Cut every text block longer than `max_bytes` at a char boundary and append
/// a marker saying how much was dropped. `max_bytes == 0` disables it.
pub(crate) fn truncate_response_if_needed(mut result: ToolCallResult, max_bytes: usize) -> ToolCallResult {
    if max_bytes == 0 {
        return result;
    }
    for content in &mut result.content {
        let total = content.text.len();
        if total <= max_bytes {
            continue;
        }
        let cut = floor_char_boundary(&content.text, max_bytes);
        content.text.truncate(cut);
        content.text.push_str(&format!(
            "\n\n[Response truncated: showing {} of {} bytes. Narrow the query with filters or request fewer files.]",
            cut, total
        ));
    }
    result
}

/// Passes of [`fit_file_contents`]; later passes absorb the bytes the
/// `truncated` markers add.
const FIT_PASSES: usize = 4;

/// Shrink the `content` strings under `value["files"]` until the
/// pretty-printed response fits in `max_bytes`. Every entry and the summary
/// are kept; a shortened entry gets `"truncated": true` and its full size in
/// `contentBytes`. Returns how many entries were shortened.
pub(crate) fn fit_file_contents(value: &mut Value, max_bytes: usize) -> usize {
    if max_bytes == 0 {
        return 0;
    }
    let mut truncated = 0;
    for _ in 0..FIT_PASSES {
        let size = pretty_len(value);
        if size <= max_bytes {
            break;
        }
        let Some(files) = value.get_mut("files").and_then(Value::as_array_mut) else {
            break;
        };
        let lengths: Vec<usize> = files.iter().map(content_len).collect();
        let total: usize = lengths.iter().sum();
        if total == 0 {
            break;
        }
        let caps = share_budget(&lengths, total.saturating_sub(size - max_bytes));
        for (file, cap) in files.iter_mut().zip(caps) {
            cut_content(file, cap);
        }
        truncated = files.iter().filter(|f| f.get("truncated").is_some()).count();
        if let Some(summary) = value.get_mut("summary").and_then(Value::as_object_mut) {
            summary.insert("truncatedFiles".to_string(), json!(truncated));
        }
    }
    truncated
}

fn pretty_len(value: &Value) -> usize {
    serde_json::to_vec_pretty(value).map_or(0, |v| v.len())
}

fn content_len(file: &Value) -> usize {
    file.get("content").and_then(Value::as_str).map_or(0, str::len)
}

/// Split `budget` over entries of the given lengths: short entries keep
/// everything, the rest share what is left evenly.
fn share_budget(lengths: &[usize], budget: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..lengths.len()).collect();
    order.sort_by_key(|&i| lengths[i]);
    let mut caps = vec![0; lengths.len()];
    let mut left = budget;
    for (done, &i) in order.iter().enumerate() {
        let share = left / (order.len() - done);
        caps[i] = lengths[i].min(share);
        left -= caps[i];
    }
    caps
}

fn cut_content(file: &mut Value, cap: usize) {
    let Some(obj) = file.as_object_mut() else {
        return;
    };
    let Some(Value::String(content)) = obj.get_mut("content") else {
        return;
    };
    let len = content.len();
    if len <= cap {
        return;
    }
    let cut = floor_char_boundary(content, cap);
    content.truncate(cut);
    obj.entry("contentBytes").or_insert(json!(len));
    obj.insert("truncated".to_string(), Value::Bool(true));
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut cut = index.min(s.len());
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}
