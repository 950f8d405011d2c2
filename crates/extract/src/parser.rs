use serde_json::Value;
use tracing::debug;

use crate::error::ExtractError;
use crate::schema::StructuredPayload;

/// Decode a model reply into a payload.
///
/// Each step narrows or repairs the candidate text and retries decoding:
/// strip a markdown fence, decode strictly, cut out the first balanced
/// `{...}` block, double stray backslashes, then fall back to JSON5 for
/// single quotes and trailing commas. The last failure is reported together
/// with the untouched reply.
pub fn parse(raw: &str) -> Result<StructuredPayload, ExtractError> {
    let mut candidate = strip_code_fence(raw.trim()).to_string();

    let mut last_error = match decode_strict(&candidate) {
        Ok(payload) => return Ok(payload),
        Err(e) => e,
    };

    if let Some(block) = extract_balanced_object(&candidate) {
        if block.len() != candidate.len() {
            debug!(from = candidate.len(), to = block.len(), "narrowed reply to balanced object");
            let block = block.to_string();
            match decode_strict(&block) {
                Ok(payload) => return Ok(payload),
                Err(e) => last_error = e,
            }
            candidate = block;
        }
    }

    let repaired = repair_backslashes(&candidate);
    if repaired != candidate {
        match decode_strict(&repaired) {
            Ok(payload) => return Ok(payload),
            Err(e) => last_error = e,
        }
    }

    match decode_lenient(&candidate) {
        Ok(payload) => return Ok(payload),
        Err(e) => last_error = format!("{last_error}; lenient: {e}"),
    }

    Err(ExtractError::MalformedResponse {
        reason: last_error,
        raw: raw.to_string(),
    })
}

fn decode_strict(text: &str) -> Result<StructuredPayload, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    into_payload(value)
}

fn decode_lenient(text: &str) -> Result<StructuredPayload, String> {
    let value: Value = json5::from_str(text).map_err(|e| e.to_string())?;
    into_payload(value)
}

fn into_payload(value: Value) -> Result<StructuredPayload, String> {
    if !value.is_object() {
        return Err("reply is not a JSON object".to_string());
    }
    serde_json::from_value::<StructuredPayload>(value)
        .map(StructuredPayload::normalize_identifiers)
        .map_err(|e| e.to_string())
}

/// Remove a leading ```` ``` ```` fence line and its closing line, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    // Skip the info string (`json`, `JSON`, ...) on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => return text,
    };

    let body = body.trim_end();
    match body.rfind('\n') {
        Some(last) if body[last + 1..].trim_start().starts_with("```") => body[..last].trim(),
        None if body.trim_start().starts_with("```") => "",
        _ => body.strip_suffix("```").unwrap_or(body).trim(),
    }
}

/// First complete top-level `{...}` block, skipping braces inside strings.
pub fn extract_balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if start.is_some() => in_string = true,
            '{' => {
                if start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| &text[s..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Double every backslash that does not start a valid JSON escape.
pub fn repair_backslashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some(&next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push_str("\\\\"),
        }
    }
    out
}
