//! Model-output JSON wrangling.
//!
//! Vision-language models wrap JSON in code fences, surround it with
//! prose, and truncate it when they hit the token limit. Everything here
//! is a pure function over the raw response text so the repair behavior
//! is testable without a live endpoint.

use super::TranslationFragment;
use crate::region::{Rect, RegionId};

/// Truncate to at most `max` bytes without splitting a multi-byte
/// character. Log previews of model output must survive CJK text.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Strip markdown code fences from model response text.
///
/// Models often wrap JSON in ```json ... ``` despite being told not to.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let after_open = match trimmed.find('\n') {
            Some(pos) => &trimmed[pos + 1..],
            None => trimmed,
        };
        let stripped = after_open.trim_end();
        if stripped.ends_with("```") {
            stripped[..stripped.len() - 3].trim().to_string()
        } else {
            after_open.trim().to_string()
        }
    } else {
        trimmed.to_string()
    }
}

/// Find the outermost `{...}` in a string (brace-balanced extraction).
/// Returns the whole input when no balanced object exists — truncated
/// output is handed onward for repair instead of being dropped here.
pub fn extract_json_str(text: &str) -> &str {
    let text = text.trim();
    if let Some(start) = text.find('{') {
        let mut depth = 0i32;
        let mut in_string = false;
        let mut escape_next = false;
        for (i, ch) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match ch {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        return &text[start..start + i + ch.len_utf8()];
                    }
                }
                _ => {}
            }
        }
        return &text[start..];
    }
    text
}

/// Close an unterminated string, drop a dangling `:`/`,`, and balance any
/// unclosed braces/brackets. Token-limit truncation usually cuts mid-array.
pub fn repair_truncated_json(input: &str) -> String {
    let mut json = input.trim().to_string();
    if json.is_empty() {
        return json;
    }

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in json.chars() {
        if ch == '"' && !escaped {
            in_string = !in_string;
        } else if ch == '\\' && in_string {
            escaped = !escaped;
        } else {
            escaped = false;
        }
        if !in_string {
            match ch {
                '{' | '[' => stack.push(ch),
                '}' | ']' => {
                    stack.pop();
                }
                _ => {}
            }
        }
    }

    if in_string {
        json.push('"');
    }
    let trimmed_end = json.trim_end().to_string();
    if trimmed_end.ends_with(':') {
        json.push_str(" null");
    } else if trimmed_end.ends_with(',') {
        json = trimmed_end[..trimmed_end.len() - 1].to_string();
    }
    while let Some(opening) = stack.pop() {
        json.push(if opening == '{' { '}' } else { ']' });
    }
    json
}

/// Coordinates above this are clearly pixels, not the requested
/// normalized [0, 1000] space.
const NORMALIZED_MAX: f64 = 1100.0;

/// Parse a model response into fragments for one crop.
///
/// Accepts the `{"translations": [...]}` shape with normalized [0, 1000]
/// coordinates (scaled to the crop size), tolerates pixel coordinates via
/// a max-coordinate heuristic, and falls back to one region-filling
/// fragment when the model answered with plain prose.
pub fn parse_fragments(
    content: &str,
    region_id: Option<RegionId>,
    crop_w: u32,
    crop_h: u32,
) -> Vec<TranslationFragment> {
    let clean = strip_code_fences(content);
    if clean.is_empty() {
        return Vec::new();
    }

    if !clean.contains('{') {
        // Plain prose: the whole answer is the translation
        return vec![TranslationFragment {
            source_region_id: region_id,
            original_text: None,
            translated_text: clean,
            bbox: None,
        }];
    }

    let repaired = repair_truncated_json(extract_json_str(&clean));
    let value: serde_json::Value = match serde_json::from_str(&repaired) {
        Ok(v) => v,
        Err(e) => {
            log::warn!(
                "[PARSE] Response JSON unusable after repair: {e} — raw: {}",
                truncate_utf8(&clean, 200)
            );
            return Vec::new();
        }
    };

    let entries = match value.get("translations").and_then(|t| t.as_array()) {
        Some(entries) => entries,
        None => return Vec::new(),
    };

    let raw: Vec<(String, f64, f64, f64, f64)> = entries
        .iter()
        .filter_map(|entry| {
            let text = entry.get("translated_text")?.as_str()?.trim();
            if text.is_empty() {
                return None;
            }
            let num = |key: &str, default: f64| {
                entry.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
            };
            Some((
                text.to_string(),
                num("x", 0.0),
                num("y", 0.0),
                num("width", 100.0),
                num("height", 30.0),
            ))
        })
        .collect();

    if raw.is_empty() {
        return Vec::new();
    }

    let max_coord = raw
        .iter()
        .map(|(_, x, y, w, h)| (x + w).max(y + h))
        .fold(0.0_f64, f64::max);
    let (scale_x, scale_y) = if max_coord > NORMALIZED_MAX {
        (1.0, 1.0)
    } else {
        (crop_w as f64 / 1000.0, crop_h as f64 / 1000.0)
    };

    raw.into_iter()
        .map(|(text, x, y, w, h)| TranslationFragment {
            source_region_id: region_id,
            original_text: None,
            translated_text: text,
            bbox: Some(Rect::new(
                (x * scale_x) as i32,
                (y * scale_y) as i32,
                ((w * scale_x) as u32).max(1),
                ((h * scale_y) as u32).max(1),
            )),
        })
        .collect()
}
