//! Re-classification of backup files into operator-managed issuer types
//!
//! Restore reads an arbitrary backup file (YAML stream or JSON `List`
//! envelope), scans it into generic documents, and sorts each issuer into
//! a typed bucket. The policy is deliberately two-tier: core cert-manager
//! and Venafi types must decode cleanly or the whole extraction fails,
//! while unrecognized third-party issuer kinds are collected into a
//! "missed" list for manual migration instead of failing the run. Restore
//! never talks to a cluster.

use std::path::Path;

use kube::api::DynamicObject;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{CertopsError, Result};
use crate::scanner;
use crate::types::{ClusterIssuer, Issuer, VenafiClusterIssuer, VenafiIssuer};

/// Issuers recovered from a backup file, bucketed by target type
#[derive(Debug, Clone, Default)]
pub struct RestoredIssuers {
    pub cert_manager_issuers: Vec<Issuer>,
    pub cert_manager_cluster_issuers: Vec<ClusterIssuer>,
    pub venafi_issuers: Vec<VenafiIssuer>,
    pub venafi_cluster_issuers: Vec<VenafiClusterIssuer>,
    /// `Kind/Name` of issuer-like objects the tooling cannot convert;
    /// advisory, surfaced for manual handling
    pub missed_issuers: Vec<String>,
}

impl RestoredIssuers {
    /// Total number of issuers that were successfully re-typed
    pub fn restored_count(&self) -> usize {
        self.cert_manager_issuers.len()
            + self.cert_manager_cluster_issuers.len()
            + self.venafi_issuers.len()
            + self.venafi_cluster_issuers.len()
    }

    /// True when the file contained nothing restorable or missable
    pub fn is_empty(&self) -> bool {
        self.restored_count() == 0 && self.missed_issuers.is_empty()
    }
}

/// Read a backup file and classify every document in it
pub async fn extract(path: &Path) -> Result<RestoredIssuers> {
    let contents = tokio::fs::read_to_string(path).await?;
    let documents = parse_backup(&contents).await?;
    classify(documents)
}

/// Parse backup file contents into generic documents.
///
/// A JSON `List` envelope is unwrapped into its items; anything else is
/// treated as a `---`-separated YAML stream.
pub async fn parse_backup(contents: &str) -> Result<Vec<DynamicObject>> {
    if let Some(items) = json_list_items(contents) {
        let mut documents = Vec::with_capacity(items.len());
        for item in items {
            let doc: DynamicObject = serde_json::from_value(item)
                .map_err(|e| CertopsError::InvalidDocument(e.to_string()))?;
            documents.push(doc);
        }
        return Ok(documents);
    }

    let documents = std::sync::Mutex::new(Vec::new());
    let documents_ref = &documents;
    scanner::for_each(
        contents.as_bytes(),
        &CancellationToken::new(),
        move |doc| async move {
            documents_ref.lock().unwrap().push(doc);
            Ok(())
        },
    )
    .await?;
    Ok(documents.into_inner().unwrap())
}

/// Try to read the contents as a JSON `List` envelope
fn json_list_items(contents: &str) -> Option<Vec<Value>> {
    if !contents.trim_start().starts_with('{') {
        return None;
    }
    let value: Value = serde_json::from_str(contents).ok()?;
    match value.get("items")?.clone() {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// Classify documents into typed buckets.
///
/// Core types decode strictly and fail the extraction on error; unknown
/// issuer-like kinds go to `missed_issuers`; everything else is ignored.
pub fn classify(documents: Vec<DynamicObject>) -> Result<RestoredIssuers> {
    let mut restored = RestoredIssuers::default();

    for doc in documents {
        let Some(types) = doc.types.clone() else {
            continue;
        };
        let group = types
            .api_version
            .rsplit_once('/')
            .map(|(g, _)| g)
            .unwrap_or_default();
        let kind = types.kind.as_str();
        let name = doc.metadata.name.clone().unwrap_or_default();

        match (group, kind) {
            ("cert-manager.io", "Issuer") => {
                restored.cert_manager_issuers.push(decode(doc, kind, &name)?);
            }
            ("cert-manager.io", "ClusterIssuer") => {
                restored
                    .cert_manager_cluster_issuers
                    .push(decode(doc, kind, &name)?);
            }
            ("jetstack.io", "VenafiIssuer") => {
                restored.venafi_issuers.push(decode(doc, kind, &name)?);
            }
            ("jetstack.io", "VenafiClusterIssuer") => {
                restored
                    .venafi_cluster_issuers
                    .push(decode(doc, kind, &name)?);
            }
            _ if kind.contains("Issuer") => {
                restored.missed_issuers.push(format!("{}/{}", kind, name));
            }
            // Non-issuer resources: restore only cares about issuer
            // migration.
            _ => {}
        }
    }

    Ok(restored)
}

/// Strict-decode a generic document into a typed struct; failure is fatal
/// because a malformed core resource means the backup is corrupt
fn decode<T: serde::de::DeserializeOwned>(
    doc: DynamicObject,
    kind: &str,
    name: &str,
) -> Result<T> {
    let value = serde_json::to_value(&doc)?;
    serde_json::from_value(value).map_err(|e| CertopsError::CorruptBackup {
        kind: kind.to_string(),
        name: name.to_string(),
        message: e.to_string(),
    })
}
