//! Response normalization: raw backend bodies into flat records with a
//! fixed key set.
//!
//! Downstream state tracking diffs records key by key, so a contract's
//! keys are always present in the output. An absent path yields an
//! explicit null rather than an omitted key; a key that flickers in and
//! out across refreshes would otherwise show up as spurious drift.

use crate::document::{Record, path_lookup};
use crate::errors::ReconcileError;
use crate::fetch::CollectionPage;
use serde_json::Value;

#[derive(Clone, Debug)]
struct OutputField {
    name: String,
    path: String,
}

/// The declared output shape of a resource: which keys the normalized
/// record carries and where in the response body each one comes from.
#[derive(Clone, Debug, Default)]
pub struct OutputContract {
    fields: Vec<OutputField>,
}

impl OutputContract {
    pub fn new() -> Self {
        OutputContract { fields: Vec::new() }
    }

    /// A field read from a top-level key of the same name.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.push(OutputField {
            path: name.clone(),
            name,
        });
        self
    }

    /// A field read from an arbitrary path, e.g. `agent.status`.
    pub fn field_at(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.fields.push(OutputField {
            name: name.into(),
            path: path.into(),
        });
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Projects a response body onto the contract. Every declared key is
    /// present in the result; paths the body does not contain map to null.
    pub fn normalize(&self, body: &Value) -> Record {
        let mut record = Record::new();
        for field in &self.fields {
            let value = path_lookup(body, &field.path).or_null().clone();
            record.insert(field.name.clone(), value);
        }
        record
    }
}

/// Decodes one page of a list response. `data_list` must be present and
/// an array of objects; `total_num` is optional and non-numeric values
/// are ignored rather than trusted.
pub fn extract_page(body: &Value, offset: u64) -> Result<CollectionPage, ReconcileError> {
    let list = match path_lookup(body, "data_list").found() {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ReconcileError::Decoding {
                path: "data_list".into(),
                detail: "expected an array".into(),
            });
        }
        None => {
            return Err(ReconcileError::Decoding {
                path: "data_list".into(),
                detail: "key absent from list response".into(),
            });
        }
    };

    let mut records = Vec::with_capacity(list.len());
    for (index, item) in list.iter().enumerate() {
        let record = Record::from_value(item.clone()).ok_or_else(|| ReconcileError::Decoding {
            path: format!("data_list[{index}]"),
            detail: "expected an object".into(),
        })?;
        records.push(record);
    }

    let total = path_lookup(body, "total_num").found().and_then(Value::as_u64);

    Ok(CollectionPage {
        records,
        total,
        offset,
    })
}
