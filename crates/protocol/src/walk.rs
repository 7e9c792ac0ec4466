//! Bounded-depth structural search over `serde_json::Value`.
//!
//! Agent payload shapes vary by event type, so identifiers (thread id, turn
//! id, search queries) are located by walking the tree instead of by fixed
//! paths. Every walk is capped by depth.

use serde_json::Value;

/// Default depth cap for identifier searches.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Visit every node breadth-first up to `max_depth` levels below `root`.
///
/// The callback receives the key the node was found under (if any), the node
/// and its depth. Returning `false` stops the walk.
pub fn visit<'a, F>(root: &'a Value, max_depth: usize, mut f: F)
where
    F: FnMut(Option<&'a str>, &'a Value, usize) -> bool,
{
    let mut frontier: Vec<(Option<&'a str>, &'a Value, usize)> = vec![(None, root, 0)];
    let mut next = Vec::new();
    while !frontier.is_empty() {
        for (key, node, depth) in frontier.drain(..) {
            if !f(key, node, depth) {
                return;
            }
            if depth >= max_depth {
                continue;
            }
            match node {
                Value::Object(map) => {
                    for (k, v) in map {
                        next.push((Some(k.as_str()), v, depth + 1));
                    }
                }
                Value::Array(items) => {
                    for v in items {
                        next.push((key, v, depth + 1));
                    }
                }
                _ => {}
            }
        }
        std::mem::swap(&mut frontier, &mut next);
    }
}

/// Find the shallowest non-empty string stored under any of `keys`.
pub fn find_string<'a>(root: &'a Value, keys: &[&str], max_depth: usize) -> Option<&'a str> {
    let mut found = None;
    visit(root, max_depth, |key, node, _| {
        if let (Some(k), Value::String(s)) = (key, node) {
            if keys.contains(&k) && !s.trim().is_empty() {
                found = Some(s.as_str());
                return false;
            }
        }
        true
    });
    found
}

/// Find the `id` of the shallowest object stored under any of `parents`
/// (e.g. `thread.id`).
pub fn find_nested_id<'a>(root: &'a Value, parents: &[&str], max_depth: usize) -> Option<&'a str> {
    let mut found = None;
    visit(root, max_depth, |key, node, _| {
        if let (Some(k), Value::Object(map)) = (key, node) {
            if parents.contains(&k) {
                if let Some(id) = map.get("id").and_then(Value::as_str) {
                    if !id.is_empty() {
                        found = Some(id);
                        return false;
                    }
                }
            }
        }
        true
    });
    found
}

/// Thread id a payload belongs to, if it names one.
pub fn thread_id(params: &Value) -> Option<&str> {
    find_string(
        params,
        &["threadId", "thread_id", "conversationId"],
        DEFAULT_MAX_DEPTH,
    )
    .or_else(|| find_nested_id(params, &["thread"], DEFAULT_MAX_DEPTH))
}

/// Turn id a payload belongs to, if it names one.
pub fn turn_id(params: &Value) -> Option<&str> {
    find_string(params, &["turnId", "turn_id"], DEFAULT_MAX_DEPTH)
        .or_else(|| find_nested_id(params, &["turn"], DEFAULT_MAX_DEPTH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_top_level_thread_id() {
        let params = json!({"threadId": "thr_1", "delta": "x"});
        assert_eq!(thread_id(&params), Some("thr_1"));
    }

    #[test]
    fn finds_nested_thread_object() {
        let params = json!({"thread": {"id": "thr_2", "cwd": "/tmp"}});
        assert_eq!(thread_id(&params), Some("thr_2"));
    }

    #[test]
    fn finds_snake_case_inside_arrays() {
        let params = json!({"msg": {"events": [{"thread_id": "thr_3"}]}});
        assert_eq!(thread_id(&params), Some("thr_3"));
    }

    #[test]
    fn prefers_shallowest_match() {
        let params = json!({"item": {"threadId": "deep"}, "threadId": "shallow"});
        assert_eq!(thread_id(&params), Some("shallow"));
    }

    #[test]
    fn respects_depth_cap() {
        let params = json!({"a": {"b": {"c": {"d": {"e": {"f": {"g": {"threadId": "too_deep"}}}}}}}});
        assert_eq!(thread_id(&params), None);
    }

    #[test]
    fn finds_turn_from_turn_object() {
        let params = json!({"threadId": "t", "turn": {"id": "turn_5", "status": "completed"}});
        assert_eq!(turn_id(&params), Some("turn_5"));
    }

    #[test]
    fn ignores_empty_strings() {
        let params = json!({"threadId": "", "nested": {"threadId": "real"}});
        assert_eq!(thread_id(&params), Some("real"));
    }
}
