//! Model response parsing into per-record results
//!
//! Parsing never fails: anything that cannot be decoded yields an empty map,
//! which the engine treats as a batch with zero resolved records.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use shared::RecordId;

use crate::types::{ResponseEncoding, ResultMap, NO_PLACE_SENTINEL};

/// Normalized structured result, serialized compactly as the stored result string
#[derive(Serialize)]
struct PlaceResult<'a> {
    has_place: u8,
    places: &'a [Value],
}

/// Remove a surrounding ``` fence (with optional language tag) if present
pub fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    if raw.starts_with("```") {
        let lines: Vec<&str> = raw.lines().collect();
        if lines.len() >= 3 && lines[lines.len() - 1].starts_with("```") {
            return lines[1..lines.len() - 1].join("\n").trim().to_string();
        }
    }
    raw.to_string()
}

/// Decode raw model output into `id -> result` for the expected ids only
pub fn parse_response(raw: &str, expected_ids: &[RecordId], encoding: ResponseEncoding) -> ResultMap {
    let text = strip_code_fence(raw);
    match encoding {
        ResponseEncoding::StructuredBatch => parse_structured(&text, expected_ids),
        ResponseEncoding::DelimitedBatch => parse_delimited(&text, expected_ids),
    }
}

fn parse_structured(text: &str, expected_ids: &[RecordId]) -> ResultMap {
    let mut out = ResultMap::new();
    let expected: HashSet<RecordId> = expected_ids.iter().copied().collect();

    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return out,
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("results") {
            Some(Value::Array(items)) => items,
            _ => return out,
        },
        _ => return out,
    };

    for item in items {
        let Value::Object(obj) = item else { continue };
        let Some(id) = obj.get("id").and_then(coerce_id) else { continue };
        if !expected.contains(&id) {
            continue;
        }

        let has_place = obj.get("has_place").map(coerce_flag).unwrap_or(0);
        let places: &[Value] = match obj.get("places") {
            Some(Value::Array(places)) => places,
            _ => &[],
        };

        if let Ok(compact) = serde_json::to_string(&PlaceResult { has_place, places }) {
            // later duplicates overwrite earlier ones
            out.insert(id, compact);
        }
    }

    out
}

fn parse_delimited(text: &str, expected_ids: &[RecordId]) -> ResultMap {
    let mut out = ResultMap::new();
    let text = text.trim();
    if text.is_empty() {
        return out;
    }
    let text = text.strip_suffix(';').unwrap_or(text);

    let segments: Vec<&str> = text.split(';').collect();
    // more answers than records means positions can no longer be trusted
    if segments.len() > expected_ids.len() {
        return out;
    }

    for (segment, &id) in segments.into_iter().zip(expected_ids.iter()) {
        out.insert(id, parse_segment(segment.trim()));
    }

    out
}

fn parse_segment(segment: &str) -> String {
    let (flag, rest) = match segment.split_once(',') {
        Some((flag, rest)) => (flag, rest),
        None => (segment, ""),
    };

    match flag.trim().parse::<i64>() {
        Ok(0) => NO_PLACE_SENTINEL.to_string(),
        Ok(_) => rest.to_string(),
        Err(_) => NO_PLACE_SENTINEL.to_string(),
    }
}

fn coerce_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as RecordId)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_flag(value: &Value) -> u8 {
    let truthy = match value {
        Value::Bool(b) => *b,
        Value::Number(n) => match n.as_i64() {
            Some(i) => i != 0,
            None => n.as_f64().map(|f| f.trunc() != 0.0).unwrap_or(false),
        },
        Value::String(s) => s.trim().parse::<i64>().map(|i| i != 0).unwrap_or(false),
        _ => false,
    };
    u8::from(truthy)
}
