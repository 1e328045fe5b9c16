//! Field collection: configuration values extracted into a neutral,
//! order-preserving key/value set before encoding.
//!
//! The "ignore if empty" rule: optional values that are `None`, empty
//! strings, or empty lists never enter the set, so they are neither sent
//! as query parameters nor serialized into request bodies. Booleans and
//! zeroes are meaningful and always kept.

use indexmap::IndexMap;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Whether the value is dropped by the ignore-if-empty rule.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Str(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Int(_) | FieldValue::Bool(_) => false,
        }
    }

    /// Query-string rendering of a scalar. Lists are expanded into repeated
    /// keys by the encoder before this is called; a nested list renders
    /// comma-joined as a fallback.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Str(s) => s.clone(),
            FieldValue::Int(n) => n.to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::List(items) => items
                .iter()
                .map(FieldValue::render)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::Int(n) => Value::from(*n),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldSet {
    fields: IndexMap<String, FieldValue>,
}

impl FieldSet {
    pub fn new() -> Self {
        FieldSet {
            fields: IndexMap::new(),
        }
    }

    /// Inserts unconditionally, bypassing the ignore-if-empty rule. Used
    /// for required fields where an empty value is the caller's mistake
    /// and should reach the backend for rejection.
    pub fn set(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    /// Inserts unless the value is empty per the ignore-if-empty rule.
    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<FieldValue>) {
        if let Some(value) = value
            && !value.is_empty()
        {
            self.fields.insert(key.into(), value);
        }
    }

    pub fn set_str(&mut self, key: impl Into<String>, value: &str) {
        self.set_opt(key, Some(FieldValue::Str(value.to_string())));
    }

    pub fn set_opt_str(&mut self, key: impl Into<String>, value: Option<&str>) {
        self.set_opt(key, value.map(|v| FieldValue::Str(v.to_string())));
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.set(key, FieldValue::Int(value));
    }

    pub fn set_opt_int(&mut self, key: impl Into<String>, value: Option<i64>) {
        self.set_opt(key, value.map(FieldValue::Int));
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, FieldValue::Bool(value));
    }

    pub fn set_list(&mut self, key: impl Into<String>, values: Vec<String>) {
        let items = values.into_iter().map(FieldValue::Str).collect::<Vec<_>>();
        self.set_opt(key, Some(FieldValue::List(items)));
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(FieldValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_if_empty() {
        let mut fields = FieldSet::new();
        fields.set_opt_str("host_name", Some("web-1"));
        fields.set_opt_str("enterprise_project_id", Some(""));
        fields.set_opt_str("version", None);
        fields.set_list("group_ids", vec![]);

        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get_str("host_name"), Some("web-1"));
        assert!(!fields.contains("enterprise_project_id"));
        assert!(!fields.contains("version"));
        assert!(!fields.contains("group_ids"));
    }

    #[test]
    fn test_falsy_scalars_are_kept() {
        let mut fields = FieldSet::new();
        fields.set_bool("enable", false);
        fields.set_int("offset", 0);

        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("enable"), Some(&FieldValue::Bool(false)));
        assert_eq!(fields.get("offset"), Some(&FieldValue::Int(0)));
    }

    #[test]
    fn test_set_bypasses_empty_rule() {
        let mut fields = FieldSet::new();
        fields.set("required_name", FieldValue::Str(String::new()));
        assert!(fields.contains("required_name"));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut fields = FieldSet::new();
        fields.set_str("zebra", "z");
        fields.set_str("alpha", "a");

        let keys: Vec<&String> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["zebra", "alpha"]);
    }

    #[test]
    fn test_render() {
        assert_eq!(FieldValue::Str("x".into()).render(), "x");
        assert_eq!(FieldValue::Int(-5).render(), "-5");
        assert_eq!(FieldValue::Bool(true).render(), "true");
        let list = FieldValue::List(vec![FieldValue::Str("a".into()), FieldValue::Int(1)]);
        assert_eq!(list.render(), "a,1");
    }
}
