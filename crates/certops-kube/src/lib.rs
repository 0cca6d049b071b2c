//! Certops Kube - Kubernetes integration for certops
//!
//! This crate implements the cluster resource manifest pipeline behind the
//! certops CLI:
//!
//! - **Typed Clients** (`resource`): per-resource Get/List/Presence queries
//!   with typed not-found signals and field redaction
//! - **Document Scanner** (`scanner`): streaming split of `---`-separated
//!   YAML manifests into generic documents
//! - **Issuer Registry** (`issuers`): the closed table of supported issuer
//!   CRDs and runtime detection of which are installed
//! - **Apply Engine** (`apply`): idempotent create-or-patch reconciliation
//!   of manifest streams, strictly in stream order
//! - **Backup Exporter** (`backup`): point-in-time export of issuers,
//!   certificates and policies with redaction applied
//! - **Restore Classifier** (`restore`): re-typing of arbitrary backup
//!   files into operator-managed issuers, tracking what cannot be migrated
//!
//! Every operation is one-shot and synchronous from the caller's point of
//! view; the only suspension points are cluster calls and stream reads,
//! both cancellable through a shared `CancellationToken`.

pub mod apply;
pub mod backup;
pub mod error;
pub mod issuers;
pub mod redact;
pub mod resource;
pub mod restore;
pub mod scanner;
pub mod sink;
pub mod types;

pub use apply::{
    ApplyClient, ApplyEngine, ApplySummary, ClusterApplyClient, CreateOutcome, MockApplyClient,
    FIELD_MANAGER,
};
pub use backup::{
    Backup, BackupBundle, BackupExporter, BackupFormat, BackupOptions, ensure_cert_manager_v1,
    filter_ingress_certificates,
};
pub use error::{CertopsError, Result};
pub use issuers::{classify_crd_names, crd_descriptor, installed_issuer_kinds, IssuerKind};
pub use redact::{RedactionList, DEFAULT_REDACTIONS};
pub use resource::{ResourceDescriptor, TypedClient};
pub use restore::{extract, RestoredIssuers};
pub use sink::{ClusterSink, ManifestSink, WriterSink};
pub use types::{ClusterIssuer, Issuer, VenafiClusterIssuer, VenafiIssuer};
