//! Reconciliation core for a host-protection backend.
//!
//! Declared configuration goes in one side, converged remote state comes
//! out the other. The pipeline: collect declared values into a
//! [`fields::FieldSet`], encode them deterministically, send them through
//! the [`transport::ApiTransport`] seam, normalize whatever the backend
//! answers into flat [`document::Record`]s, and poll until the backend's
//! asynchronous machinery settles. [`orchestrate::Orchestrator`] wires
//! those pieces into the four lifecycle operations.

pub mod descriptor;
pub mod document;
pub mod encode;
pub mod errors;
pub mod fetch;
pub mod fields;
pub mod metrics_defs;
pub mod normalize;
pub mod orchestrate;
pub mod poll;
pub mod testutils;

pub use descriptor::{DescriptorSet, OperationDescriptor, WaitTable};
pub use document::{Lookup, Record, path_lookup};
pub use errors::{ReconcileError, Result};
pub use fetch::{CollectionPage, fetch_all};
pub use fields::{FieldSet, FieldValue};
pub use normalize::OutputContract;
pub use orchestrate::{
    CreateGuard, OffsetPlacement, Orchestrator, ReadStyle, ResourceSpec,
};
pub use poll::{AbsenceRule, Probe, WaitSpec, await_convergence};
