//! Web search query extraction.
//!
//! Search queries show up in many shapes: a plain `query` field, a `queries`
//! array, tool arguments serialized as a JSON string, or a search engine URL
//! with `?q=`. All of them are collected, de-duplicated in first-seen order,
//! and filtered for plausibility.

use serde_json::Value;

const QUERY_KEYS: &[&str] = &[
    "query",
    "queries",
    "q",
    "search_query",
    "searchQuery",
    "search_term",
    "searchTerm",
];

const URL_QUERY_PARAMS: &[&str] = &["q", "query", "search_query", "p"];

const MAX_DEPTH: usize = 12;
const MIN_QUERY_CHARS: usize = 2;
const MAX_QUERY_CHARS: usize = 300;

/// Collect every plausible search query found anywhere in `value`.
pub fn extract_search_queries(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect(value, None, 0, &mut out);
    out
}

/// True when `value` carries at least one query-shaped field at its top level
/// (or inside a JSON-encoded `arguments` string).
pub fn has_query_fields(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(k, v)| {
            (QUERY_KEYS.contains(&k.as_str()) && !v.is_null())
                || ((k == "arguments" || k == "input") && has_query_fields(&decode_embedded(v)))
        }),
        _ => false,
    }
}

fn decode_embedded(value: &Value) -> Value {
    match value {
        Value::String(s) if looks_like_json(s) => {
            serde_json::from_str(s.trim()).unwrap_or(Value::Null)
        }
        other => other.clone(),
    }
}

fn collect(value: &Value, key: Option<&str>, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                collect(v, Some(k), depth + 1, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, key, depth + 1, out);
            }
        }
        Value::String(s) => {
            if looks_like_json(s) {
                if let Ok(parsed) = serde_json::from_str::<Value>(s.trim()) {
                    collect(&parsed, key, depth + 1, out);
                }
            } else if looks_like_url(s) {
                for candidate in url_queries(s) {
                    push_candidate(&candidate, out);
                }
            } else if key.is_some_and(|k| QUERY_KEYS.contains(&k)) {
                push_candidate(s, out);
            }
        }
        _ => {}
    }
}

fn looks_like_json(s: &str) -> bool {
    let t = s.trim_start();
    t.starts_with('{') || t.starts_with('[')
}

fn looks_like_url(s: &str) -> bool {
    let t = s.trim();
    t.starts_with("http://") || t.starts_with("https://")
}

/// Values of query-like parameters in a URL's query string.
fn url_queries(url: &str) -> Vec<String> {
    let Some((_, query)) = url.trim().split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(k, _)| URL_QUERY_PARAMS.contains(k))
        .filter_map(|(_, v)| {
            let spaced = v.replace('+', " ");
            urlencoding::decode(&spaced).ok().map(|s| s.into_owned())
        })
        .collect()
}

fn push_candidate(raw: &str, out: &mut Vec<String>) {
    let candidate = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars = candidate.chars().count();
    if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&chars) {
        return;
    }
    if looks_like_json(&candidate) || candidate.contains("://") {
        return;
    }
    if out.iter().any(|q| q.eq_ignore_ascii_case(&candidate)) {
        return;
    }
    out.push(candidate);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merges_plain_embedded_and_url_queries() {
        let item = json!({
            "type": "webSearch",
            "query": "rust async traits",
            "arguments": "{\"query\": \"tokio select\", \"queries\": [\"rust async traits\"]}",
            "action": {"url": "https://www.google.com/search?q=axum+websocket%20upgrade&hl=en"}
        });
        let queries = extract_search_queries(&item);
        assert_eq!(queries.len(), 3);
        assert!(queries.contains(&"rust async traits".to_string()));
        assert!(queries.contains(&"tokio select".to_string()));
        assert!(queries.contains(&"axum websocket upgrade".to_string()));
    }

    #[test]
    fn dedupes_case_insensitively_in_first_seen_order() {
        let value = json!({"queries": ["Serde Flatten", "serde flatten", "serde untagged"]});
        assert_eq!(
            extract_search_queries(&value),
            vec!["Serde Flatten".to_string(), "serde untagged".to_string()]
        );
    }

    #[test]
    fn rejects_implausible_candidates() {
        let long = "x".repeat(400);
        let value = json!({"queries": ["a", long, "ftp://host/file", "ok query"]});
        assert_eq!(extract_search_queries(&value), vec!["ok query".to_string()]);
    }

    #[test]
    fn ignores_strings_under_unrelated_keys() {
        let value = json!({"title": "not a query", "q": "real one"});
        assert_eq!(extract_search_queries(&value), vec!["real one".to_string()]);
    }

    #[test]
    fn detects_query_fields_in_encoded_arguments() {
        assert!(has_query_fields(&json!({"arguments": "{\"q\": \"hi\"}"})));
        assert!(has_query_fields(&json!({"query": "hi"})));
        assert!(!has_query_fields(&json!({"path": "/tmp"})));
    }
}
