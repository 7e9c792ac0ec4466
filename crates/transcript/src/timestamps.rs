use chrono::DateTime;
use serde_json::Value;

const TIMESTAMP_KEYS: &[&str] = &[
    "createdAt",
    "created_at",
    "timestamp",
    "startedAt",
    "started_at",
    "completedAt",
    "completed_at",
];

/// Values below this are taken as epoch seconds rather than milliseconds.
const SECONDS_CUTOFF: i64 = 100_000_000_000;

/// Epoch milliseconds from a number (seconds or ms), a numeric string, or an
/// RFC 3339 string.
pub(crate) fn parse_timestamp(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(n) => n,
                Err(_) => return DateTime::parse_from_rfc3339(s).ok().map(|t| t.timestamp_millis()),
            }
        }
        _ => return None,
    };
    if raw <= 0 {
        return None;
    }
    Some(if raw < SECONDS_CUTOFF { raw * 1000 } else { raw })
}

/// The object's own timestamp, looked up on its top-level keys only.
pub(crate) fn own_timestamp(object: &Value) -> Option<i64> {
    TIMESTAMP_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(parse_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_seconds_millis_and_rfc3339() {
        assert_eq!(parse_timestamp(&json!(1_700_000_000)), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp(&json!(1_700_000_000_123_i64)), Some(1_700_000_000_123));
        assert_eq!(
            parse_timestamp(&json!("2023-11-14T22:13:20Z")),
            Some(1_700_000_000_000)
        );
        assert_eq!(parse_timestamp(&json!("soon")), None);
    }

    #[test]
    fn own_timestamp_ignores_nested_values() {
        let item = json!({"payload": {"createdAt": 1_700_000_000}});
        assert_eq!(own_timestamp(&item), None);
        assert_eq!(own_timestamp(&json!({"created_at": 5_000_000_000_000_i64})), Some(5_000_000_000_000));
    }
}
