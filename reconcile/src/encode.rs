//! Deterministic encoding of a collected field set into the two request
//! shapes the backend accepts: a URL query string and a JSON body.
//!
//! Keys are emitted in sorted order so the same field set always produces
//! the same request bytes; list values expand into repeated keys, elements
//! in their original order.

use crate::fields::{FieldSet, FieldValue};
use serde_json::{Map, Value};
use url::form_urlencoded;

fn sorted_entries(fields: &FieldSet) -> Vec<(&String, &FieldValue)> {
    let mut entries: Vec<(&String, &FieldValue)> = fields.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Ordered query pairs, ready to hand to the transport.
pub fn query_pairs(fields: &FieldSet) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in sorted_entries(fields) {
        match value {
            FieldValue::List(items) => {
                for item in items {
                    pairs.push((key.clone(), item.render()));
                }
            }
            scalar => pairs.push((key.clone(), scalar.render())),
        }
    }
    pairs
}

/// Percent-encoded query string for the field set.
pub fn query_string(fields: &FieldSet) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in query_pairs(fields) {
        serializer.append_pair(&key, &value);
    }
    serializer.finish()
}

/// JSON request body for the field set. Lists stay arrays here; repetition
/// is a query-string concern only.
pub fn json_body(fields: &FieldSet) -> Value {
    let mut map = Map::new();
    for (key, value) in sorted_entries(fields) {
        map.insert(key.clone(), value.to_json());
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> FieldSet {
        let mut fields = FieldSet::new();
        fields.set_str("version", "hss.version.wtp");
        fields.set_list(
            "host_ids",
            vec!["h-2".to_string(), "h-1".to_string(), "h-3".to_string()],
        );
        fields.set_bool("charging_mode", true);
        fields.set_int("period", 12);
        fields
    }

    #[test]
    fn test_query_pairs_sorted_and_expanded() {
        let pairs = query_pairs(&sample());
        let rendered: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        assert_eq!(
            rendered,
            [
                "charging_mode=true",
                "host_ids=h-2",
                "host_ids=h-1",
                "host_ids=h-3",
                "period=12",
                "version=hss.version.wtp",
            ]
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        // Same fields inserted in a different order must encode identically.
        let mut reordered = FieldSet::new();
        reordered.set_int("period", 12);
        reordered.set_bool("charging_mode", true);
        reordered.set_list(
            "host_ids",
            vec!["h-2".to_string(), "h-1".to_string(), "h-3".to_string()],
        );
        reordered.set_str("version", "hss.version.wtp");

        assert_eq!(query_string(&sample()), query_string(&reordered));
        assert_eq!(json_body(&sample()), json_body(&reordered));
    }

    #[test]
    fn test_query_string_percent_encodes() {
        let mut fields = FieldSet::new();
        fields.set_str("host_name", "web server/1");
        assert_eq!(query_string(&fields), "host_name=web+server%2F1");
    }

    #[test]
    fn test_json_body_shape() {
        let body = json_body(&sample());
        assert_eq!(
            body,
            json!({
                "charging_mode": true,
                "host_ids": ["h-2", "h-1", "h-3"],
                "period": 12,
                "version": "hss.version.wtp",
            })
        );
    }

    #[test]
    fn test_empty_set() {
        let fields = FieldSet::new();
        assert_eq!(query_string(&fields), "");
        assert!(query_pairs(&fields).is_empty());
        assert_eq!(json_body(&fields), json!({}));
    }
}
