//! The generic document tree behind every backend entity.
//!
//! Responses are nested JSON of unpredictable shape; instead of threading
//! untyped values through the engine, everything is wrapped in [`Record`]
//! and read through [`path_lookup`], which distinguishes "present" from
//! "absent" before any defaulting happens.

use serde_json::{Map, Value};

static NULL: Value = Value::Null;

/// One remote entity: an immutable snapshot of the fields the backend
/// returned. No identity beyond those fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(Map::new())
    }

    /// Wraps a JSON value; anything other than an object is rejected.
    pub fn from_value(value: Value) -> Option<Record> {
        match value {
            Value::Object(map) => Some(Record(map)),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path query rooted at this record. See [`path_lookup`] for syntax.
    pub fn path(&self, path: &str) -> Lookup<'_> {
        let Some(segments) = parse_path(path) else {
            return Lookup::Missing;
        };
        let mut iter = segments.into_iter();
        let current = match iter.next() {
            Some(Segment::Key(key)) => match self.0.get(key) {
                Some(value) => value,
                None => return Lookup::Missing,
            },
            _ => return Lookup::Missing,
        };
        walk(current, iter)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Result of a path query: the distinction between "the key was there,
/// holding null" and "the key was absent" is preserved so malformed
/// responses are not silently masked by defaults.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Value),
    Missing,
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a Value> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Lookup::Missing)
    }

    /// The caller-supplied default for absent paths.
    pub fn or(self, default: &'a Value) -> &'a Value {
        match self {
            Lookup::Found(value) => value,
            Lookup::Missing => default,
        }
    }

    pub fn or_null(self) -> &'a Value {
        self.or(&NULL)
    }

    pub fn as_str(self) -> Option<&'a str> {
        self.found().and_then(Value::as_str)
    }
}

enum Segment<'p> {
    Key(&'p str),
    Index(usize),
}

/// Parses `data_list[0].host.name` into key/index segments. Returns `None`
/// for malformed paths (empty segments, unclosed brackets, non-numeric
/// indexes).
fn parse_path(path: &str) -> Option<Vec<Segment<'_>>> {
    if path.is_empty() {
        return None;
    }

    let mut segments = Vec::new();
    for piece in path.split('.') {
        let (key, mut rest) = match piece.find('[') {
            Some(pos) => (&piece[..pos], &piece[pos..]),
            None => (piece, ""),
        };

        if key.is_empty() && rest.is_empty() {
            return None;
        }
        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }

        while !rest.is_empty() {
            if !rest.starts_with('[') {
                return None;
            }
            let close = rest.find(']')?;
            let index: usize = rest[1..close].parse().ok()?;
            segments.push(Segment::Index(index));
            rest = &rest[close + 1..];
        }
    }

    Some(segments)
}

fn walk<'a, 'p>(
    mut current: &'a Value,
    segments: impl Iterator<Item = Segment<'p>>,
) -> Lookup<'a> {
    for segment in segments {
        let next = match segment {
            Segment::Key(key) => current.as_object().and_then(|map| map.get(key)),
            Segment::Index(index) => current.as_array().and_then(|items| items.get(index)),
        };
        match next {
            Some(value) => current = value,
            None => return Lookup::Missing,
        }
    }
    Lookup::Found(current)
}

/// Path query rooted at an arbitrary JSON value.
pub fn path_lookup<'a>(root: &'a Value, path: &str) -> Lookup<'a> {
    let Some(segments) = parse_path(path) else {
        return Lookup::Missing;
    };
    walk(root, segments.into_iter())
}
