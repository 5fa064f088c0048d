//! Helpers for digging structured payloads out of free-form model output.

use fancy_regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").expect("valid regex"));

/// The outermost `open`..`close` span of a model response, looking inside
/// the first fenced code block when there is one
#[inline]
pub fn json_payload(response: &str, open: char, close: char) -> Option<&str> {
    let trimmed = response.trim();
    let body = match FENCED_BLOCK.captures(trimmed) {
        Ok(Some(captures)) => captures.get(1).map_or(trimmed, |m| m.as_str()),
        _ => trimmed,
    };

    let start = body.find(open)?;
    let end = body.rfind(close)?;
    (start < end).then(|| &body[start..end + close.len_utf8()])
}

/// JSON object payload of a response
#[inline]
pub fn json_object(response: &str) -> Option<&str> {
    json_payload(response, '{', '}')
}

/// JSON array payload of a response
#[inline]
pub fn json_array(response: &str) -> Option<&str> {
    json_payload(response, '[', ']')
}
