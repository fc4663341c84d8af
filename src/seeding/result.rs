//! Normalization of stored match results.
//!
//! Results have been written in several shapes over time. Everything funnels through
//! [`parse_result`] so the rest of the crate only ever sees a flat, even-length score list.

use serde_json::Value;
use tracing::warn;

/// The most sets a single match can have.
pub const MAX_SETS: usize = 5;

/// Normalizes a raw result into `[a1, b1, a2, b2, ...]`.
///
/// Anything that cannot be read is treated as "no result yet" and yields an empty vector.
pub fn parse_result(raw: &Value) -> Vec<i32> {
    if is_blank(raw) {
        return Vec::new();
    }

    match flatten(raw).and_then(validate) {
        Some(scores) => scores,
        None => {
            warn!("Ignoring unreadable match result: {}", raw);
            Vec::new()
        }
    }
}

/// Splits a normalized score list into `(a, b)` pairs, one per set.
pub fn set_pairs(scores: &[i32]) -> Vec<(i32, i32)> {
    scores.chunks_exact(2).map(|set| (set[0], set[1])).collect()
}

fn is_blank(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn flatten(raw: &Value) -> Option<Vec<i32>> {
    match raw {
        Value::String(s) => parse_text(s),
        Value::Array(items) => {
            let mut scores = Vec::with_capacity(items.len() * 2);
            for item in items {
                match item {
                    Value::Number(_) => scores.push(score(item)?),
                    Value::Array(pair) if pair.len() == 2 => {
                        scores.push(score(&pair[0])?);
                        scores.push(score(&pair[1])?);
                    }
                    Value::Object(_) => scores.extend(set_object(item)?),
                    // A lone number in a string counts as a score, "11-5" as a whole set.
                    Value::String(s) => match s.trim().parse::<i32>() {
                        Ok(n) => scores.push(n),
                        Err(_) => scores.extend(parse_set_text(s)?),
                    },
                    _ => return None,
                }
            }
            Some(scores)
        }
        _ => None,
    }
}

fn score(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn set_object(value: &Value) -> Option<[i32; 2]> {
    const KEYS: [(&str, &str); 3] = [("a", "b"), ("home", "away"), ("scoreA", "scoreB")];
    KEYS.iter().find_map(|(a, b)| {
        let a = score(value.get(a)?)?;
        let b = score(value.get(b)?)?;
        Some([a, b])
    })
}

fn parse_text(text: &str) -> Option<Vec<i32>> {
    let text = text.trim();
    if text.starts_with('[') {
        let nested: Value = serde_json::from_str(text).ok()?;
        return flatten(&nested);
    }

    // Sets are separated by commas or semicolons, or by whitespace when neither is used.
    let sets: Vec<&str> = if text.contains([',', ';']) {
        text.split([',', ';']).map(str::trim).collect()
    } else {
        text.split_whitespace().collect()
    };

    let mut scores = Vec::new();
    for set in sets.into_iter().filter(|set| !set.is_empty()) {
        scores.extend(parse_set_text(set)?);
    }
    Some(scores)
}

fn parse_set_text(set: &str) -> Option<[i32; 2]> {
    let (a, b) = set.trim().split_once(|c: char| c == '-' || c == ':')?;
    Some([a.trim().parse().ok()?, b.trim().parse().ok()?])
}

fn validate(scores: Vec<i32>) -> Option<Vec<i32>> {
    let valid = scores.len() % 2 == 0
        && scores.len() / 2 <= MAX_SETS
        && scores.iter().all(|score| *score >= 0);
    valid.then_some(scores)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_result, set_pairs};

    #[test]
    fn reads_every_encoding_the_same_way() {
        let expected = vec![11, 5, 9, 11, 11, 8];
        let encodings = [
            json!([11, 5, 9, 11, 11, 8]),
            json!([[11, 5], [9, 11], [11, 8]]),
            json!([{"a": 11, "b": 5}, {"home": 9, "away": 11}, {"scoreA": 11, "scoreB": 8}]),
            json!(["11-5", "9:11", "11 - 8"]),
            json!("11-5, 9-11, 11-8"),
            json!("11:5 9:11 11:8"),
            json!("11 - 5, 9 - 11, 11 - 8"),
            json!("11 : 5; 9 : 11; 11 : 8"),
            json!("[11, 5, 9, 11, 11, 8]"),
            json!(["11", "5", "9", "11", "11", "8"]),
        ];
        for raw in encodings {
            assert_eq!(parse_result(&raw), expected, "encoding {}", raw);
        }
    }

    #[test]
    fn absent_results_are_empty() {
        for raw in [json!(null), json!([]), json!(""), json!("   ")] {
            assert!(parse_result(&raw).is_empty());
        }
    }

    #[test]
    fn malformed_results_are_empty() {
        let malformed = [
            json!([11, 5, 9]),
            json!([11, -5]),
            json!([11.5, 3]),
            json!("eleven-five"),
            json!({"a": 11, "b": 5}),
            json!(true),
            json!([[11, 5, 3]]),
            json!([11, 0, 11, 0, 11, 0, 11, 0, 11, 0, 11, 0]),
        ];
        for raw in malformed {
            assert!(parse_result(&raw).is_empty(), "accepted {}", raw);
        }
    }

    #[test]
    fn five_sets_is_the_limit() {
        let raw = json!([11, 9, 9, 11, 11, 9, 9, 11, 12, 10]);
        assert_eq!(parse_result(&raw).len(), 10);
    }

    #[test]
    fn pairs_sets() {
        assert_eq!(set_pairs(&[11, 5, 7, 11]), vec![(11, 5), (7, 11)]);
    }
}
