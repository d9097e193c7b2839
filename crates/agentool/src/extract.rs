//! Extraction of the trailing JSON result object from tool stdout.
//!
//! Tools may print arbitrary diagnostics before their result. The result is
//! the last top-level JSON object in the text, followed by nothing but
//! whitespace.

use serde_json::Value;

use crate::error::{ToolError, ToolResult};

/// Extract the trailing JSON object from `text`.
///
/// Candidate `{` positions are tried from last to first; the first slice that
/// parses as exactly one JSON object (trailing whitespace allowed) wins. This
/// finds nested results whose final `{` belongs to an inner object.
///
/// # Errors
///
/// - [`ToolError::NoJsonFound`] if `text` contains no `{`.
/// - [`ToolError::InvalidJson`] if no candidate slice is a complete object,
///   which includes trailing non-JSON text and top-level arrays.
pub fn extract_json(text: &str) -> ToolResult<Value> {
    let mut candidates = text.match_indices('{').map(|(i, _)| i).rev().peekable();
    if candidates.peek().is_none() {
        return Err(ToolError::NoJsonFound);
    }

    let mut last_error = None;
    for start in candidates {
        match parse_single_object(&text[start..]) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }

    Err(ToolError::InvalidJson(
        last_error.unwrap_or_else(|| "no JSON object found".to_string()),
    ))
}

/// Parse `slice` as one JSON object followed only by whitespace.
fn parse_single_object(slice: &str) -> Result<Value, String> {
    let mut stream = serde_json::Deserializer::from_str(slice).into_iter::<Value>();
    let value = match stream.next() {
        Some(Ok(value)) => value,
        Some(Err(e)) => return Err(e.to_string()),
        None => return Err("empty input".to_string()),
    };
    if !value.is_object() {
        return Err("result is not a JSON object".to_string());
    }
    let rest = &slice[stream.byte_offset()..];
    if !rest.trim().is_empty() {
        return Err("unexpected text after JSON object".to_string());
    }
    Ok(value)
}
