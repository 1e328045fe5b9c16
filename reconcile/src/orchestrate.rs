//! Lifecycle orchestration: create, read, update, and delete against the
//! backend, composed from the collector, encoder, normalizer, fetcher,
//! and poller.
//!
//! Two backend quirks shape everything here. Mutating endpoints return
//! 200 without proof the change took effect, so every mutation ends in a
//! read or a convergence wait. And "not found" arrives as assorted
//! error codes under assorted HTTP statuses, so rejections are remapped
//! through the descriptor's code list before anything else sees them.

use crate::descriptor::OperationDescriptor;
use crate::document::{Lookup, Record};
use crate::encode::{json_body, query_pairs};
use crate::errors::{ReconcileError, Result};
use crate::fetch::{self, CollectionPage};
use crate::fields::FieldSet;
use crate::normalize::{OutputContract, extract_page};
use crate::poll::{self, AbsenceRule, Probe, WaitSpec};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use transport::{ApiRequest, ApiTransport, TransportError};

/// How a single resource is read back from the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStyle {
    /// `GET {base_path}/{id}` returns the resource directly.
    ById,
    /// No per-resource endpoint; list with the id as a filter and match
    /// on the id field client-side. Several endpoints ignore unknown
    /// filters and return everything.
    ListFilter,
}

/// Where list endpoints take their limit and offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffsetPlacement {
    Query,
    Body,
}

/// Pre-create existence check: creation is refused unless the candidate
/// record's status is one of the acceptable values.
#[derive(Clone, Debug)]
pub struct CreateGuard {
    pub status_path: String,
    pub acceptable: Vec<String>,
}

/// Static wiring for one resource kind.
pub struct ResourceSpec {
    pub descriptor: OperationDescriptor,
    pub contract: OutputContract,
    pub base_path: String,
    /// Key under which the backend returns the resource id in records.
    pub id_field: String,
    pub read_style: ReadStyle,
    pub page_limit: u64,
    pub offset_placement: OffsetPlacement,
    /// Path in the create response where the new id appears, when the
    /// endpoint returns one at all.
    pub create_id_path: Option<String>,
    pub create_guard: Option<CreateGuard>,
}

impl ResourceSpec {
    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.base_path, id)
    }
}

/// Fallback delete wait for descriptors without an explicit table: poll
/// until the record disappears.
fn default_delete_wait(operation: String) -> WaitSpec {
    WaitSpec::new(operation)
        .timeout(Duration::from_secs(300))
        .poll_interval(Duration::from_secs(10))
        .absence(AbsenceRule::Success)
}

pub struct Orchestrator {
    transport: Arc<dyn ApiTransport>,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn ApiTransport>) -> Self {
        Orchestrator { transport }
    }

    /// Lists the whole collection, filtered by `filters`, normalized
    /// through the resource's contract.
    pub async fn list(&self, spec: &ResourceSpec, filters: &FieldSet) -> Result<Vec<Record>> {
        let operation = format!("list {}", spec.descriptor.resource);
        let raw = fetch::fetch_all(&operation, |offset| self.fetch_page(spec, filters, offset))
            .await?;
        Ok(raw
            .into_iter()
            .map(|record| spec.contract.normalize(&record.into_value()))
            .collect())
    }

    async fn fetch_page(
        &self,
        spec: &ResourceSpec,
        filters: &FieldSet,
        offset: u64,
    ) -> Result<CollectionPage> {
        let request = match spec.offset_placement {
            OffsetPlacement::Query => ApiRequest::get(&spec.base_path)
                .with_query(query_pairs(filters))
                .with_query_pair("limit", spec.page_limit.to_string())
                .with_query_pair("offset", offset.to_string()),
            OffsetPlacement::Body => {
                let mut body = json_body(filters);
                if let Value::Object(map) = &mut body {
                    map.insert("limit".into(), Value::from(spec.page_limit));
                    map.insert("offset".into(), Value::from(offset));
                }
                ApiRequest::post(&spec.base_path).with_body(body)
            }
        };

        let response = self.transport.request(request).await?;
        extract_page(&response.body, offset)
    }

    /// Reads one resource by id. Absence, however the backend chooses to
    /// express it, comes back as [`ReconcileError::NotFound`].
    pub async fn read(&self, spec: &ResourceSpec, id: &str) -> Result<Record> {
        match spec.read_style {
            ReadStyle::ById => {
                let request = ApiRequest::get(spec.item_path(id));
                let response = self
                    .transport
                    .request(request)
                    .await
                    .map_err(|err| self.remap_not_found(spec, id, err))?;
                Ok(spec.contract.normalize(&response.body))
            }
            ReadStyle::ListFilter => {
                let mut filters = FieldSet::new();
                filters.set_str(&spec.id_field, id);
                let records = self.list(spec, &filters).await?;
                records
                    .into_iter()
                    .find(|record| record.get_str(&spec.id_field) == Some(id))
                    .ok_or_else(|| ReconcileError::NotFound {
                        resource: format!("{} {id}", spec.descriptor.resource),
                    })
            }
        }
    }

    /// Creates the resource, resolves its id, and waits for convergence
    /// when the descriptor asks for it. Returns the id and the final
    /// normalized state.
    pub async fn create(
        &self,
        spec: &ResourceSpec,
        fields: &FieldSet,
        unique_value: &str,
    ) -> Result<(String, Record)> {
        let operation = format!("create {}", spec.descriptor.resource);

        if let Some(guard) = &spec.create_guard {
            self.check_create_guard(spec, guard, unique_value, &operation)
                .await?;
        }

        let request = ApiRequest::post(&spec.base_path).with_body(json_body(fields));
        let response = self.transport.request(request).await?;

        let id = self
            .resolve_created_id(spec, &response.body, unique_value)
            .await?;
        tracing::info!(resource = %spec.descriptor.resource, id, "created");

        if let (Some(table), Some(status_path)) = (
            spec.descriptor.wait("create"),
            spec.descriptor.status_path.as_deref(),
        ) {
            let wait = table.to_spec(operation, AbsenceRule::Failure);
            poll::await_convergence(&wait, || self.probe_status(spec, &id, status_path)).await?;
        }

        let record = self.read(spec, &id).await?;
        Ok((id, record))
    }

    async fn check_create_guard(
        &self,
        spec: &ResourceSpec,
        guard: &CreateGuard,
        unique_value: &str,
        operation: &str,
    ) -> Result<()> {
        let candidate = self.find_by_unique_key(spec, unique_value).await?;
        let Some(candidate) = candidate else {
            return Err(ReconcileError::Precondition {
                operation: operation.to_string(),
                detail: format!(
                    "no candidate with {} = {unique_value}",
                    spec.descriptor.unique_key
                ),
            });
        };

        match candidate.path(&guard.status_path).as_str() {
            Some(status) if guard.acceptable.iter().any(|s| s == status) => Ok(()),
            Some(status) => Err(ReconcileError::Precondition {
                operation: operation.to_string(),
                detail: format!("candidate status is {status}"),
            }),
            None => Err(ReconcileError::Decoding {
                path: guard.status_path.clone(),
                detail: "guard status missing or not a string".into(),
            }),
        }
    }

    /// Finds the backend id of a just-created resource. Endpoints that
    /// return an id do so at `create_id_path`; the rest are resolved by
    /// listing and matching on the unique key.
    async fn resolve_created_id(
        &self,
        spec: &ResourceSpec,
        body: &Value,
        unique_value: &str,
    ) -> Result<String> {
        if let Some(path) = &spec.create_id_path {
            return match crate::document::path_lookup(body, path) {
                Lookup::Found(Value::String(id)) => Ok(id.clone()),
                Lookup::Found(Value::Number(n)) => Ok(n.to_string()),
                Lookup::Found(_) => Err(ReconcileError::Decoding {
                    path: path.clone(),
                    detail: "created id is neither a string nor a number".into(),
                }),
                Lookup::Missing => Err(ReconcileError::Decoding {
                    path: path.clone(),
                    detail: "created id absent from response".into(),
                }),
            };
        }

        let record = self
            .find_by_unique_key(spec, unique_value)
            .await?
            .ok_or_else(|| ReconcileError::NotFound {
                resource: format!("{} {unique_value}", spec.descriptor.resource),
            })?;
        match record.get(&spec.id_field) {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(ReconcileError::Decoding {
                path: spec.id_field.clone(),
                detail: "id field missing from matched record".into(),
            }),
        }
    }

    async fn find_by_unique_key(
        &self,
        spec: &ResourceSpec,
        unique_value: &str,
    ) -> Result<Option<Record>> {
        let mut filters = FieldSet::new();
        filters.set_str(&spec.descriptor.unique_key, unique_value);
        let records = self.list(spec, &filters).await?;
        Ok(records.into_iter().find(|record| {
            record.get_str(&spec.descriptor.unique_key) == Some(unique_value)
        }))
    }

    /// Applies an in-place update. `changed` names the fields that differ
    /// from the tracked state; if any of them is non-updatable the call
    /// fails before touching the backend.
    pub async fn update(
        &self,
        spec: &ResourceSpec,
        id: &str,
        fields: &FieldSet,
        changed: &[&str],
    ) -> Result<Record> {
        if let Some(field) = spec.descriptor.replacement_required(changed) {
            return Err(ReconcileError::RequiresReplacement {
                resource: format!("{} {id}", spec.descriptor.resource),
                field: field.to_string(),
            });
        }

        let request = ApiRequest::put(spec.item_path(id)).with_body(json_body(fields));
        self.transport
            .request(request)
            .await
            .map_err(|err| self.remap_not_found(spec, id, err))?;
        tracing::info!(resource = %spec.descriptor.resource, id, "updated");

        if let (Some(table), Some(status_path)) = (
            spec.descriptor.wait("update"),
            spec.descriptor.status_path.as_deref(),
        ) {
            let operation = format!("update {}", spec.descriptor.resource);
            let wait = table.to_spec(operation, AbsenceRule::Failure);
            poll::await_convergence(&wait, || self.probe_status(spec, id, status_path)).await?;
        }

        // A 200 from the update endpoint proves nothing; the read is the
        // source of truth for the new state.
        self.read(spec, id).await
    }

    /// Deletes the resource and polls until it is verifiably gone. A
    /// resource that is already absent is a success, not an error.
    pub async fn delete(&self, spec: &ResourceSpec, id: &str) -> Result<()> {
        let operation = format!("delete {}", spec.descriptor.resource);

        let request = ApiRequest::delete(spec.item_path(id));
        match self.transport.request(request).await {
            Ok(_) => {}
            Err(err) => {
                let err = self.remap_not_found(spec, id, err);
                if err.is_not_found() {
                    tracing::debug!(resource = %spec.descriptor.resource, id, "already absent");
                    return Ok(());
                }
                return Err(err);
            }
        }

        let wait = match spec.descriptor.wait("delete") {
            Some(table) => table.to_spec(operation, AbsenceRule::Success),
            None => default_delete_wait(operation),
        };
        let status_path = spec.descriptor.status_path.as_deref();
        poll::await_convergence(&wait, || self.probe_deleted(spec, id, status_path)).await?;
        tracing::info!(resource = %spec.descriptor.resource, id, "deleted");
        Ok(())
    }

    /// Refresh closure for create/update convergence: read the resource
    /// and pull its status out of the descriptor's status path.
    async fn probe_status(
        &self,
        spec: &ResourceSpec,
        id: &str,
        status_path: &str,
    ) -> Result<Probe> {
        match self.read(spec, id).await {
            Ok(record) => match record.path(status_path).as_str() {
                Some(status) => Ok(Probe::Observed {
                    status: status.to_string(),
                    payload: record,
                }),
                None => Err(ReconcileError::Decoding {
                    path: status_path.to_string(),
                    detail: "status missing or not a string".into(),
                }),
            },
            Err(err) if err.is_not_found() => Ok(Probe::Gone),
            Err(err) => Err(err),
        }
    }

    /// Refresh closure for delete convergence. Without a status path any
    /// still-present record counts as pending.
    async fn probe_deleted(
        &self,
        spec: &ResourceSpec,
        id: &str,
        status_path: Option<&str>,
    ) -> Result<Probe> {
        match self.read(spec, id).await {
            Ok(record) => {
                let status = status_path
                    .and_then(|path| record.path(path).as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(Probe::Observed {
                    status,
                    payload: record,
                })
            }
            Err(err) if err.is_not_found() => Ok(Probe::Gone),
            Err(err) => Err(err),
        }
    }

    /// Remaps a structured rejection whose error code is in the
    /// descriptor's not-found set, regardless of the HTTP status it
    /// arrived under.
    fn remap_not_found(
        &self,
        spec: &ResourceSpec,
        id: &str,
        err: TransportError,
    ) -> ReconcileError {
        if err
            .envelope()
            .is_some_and(|env| env.is_not_found(&spec.descriptor.not_found_codes))
        {
            return ReconcileError::NotFound {
                resource: format!("{} {id}", spec.descriptor.resource),
            };
        }
        err.into()
    }
}
