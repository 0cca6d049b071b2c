//! Point-in-time export of installed cert-manager resources
//!
//! The exporter discovers which issuer CRDs are installed, lists every
//! object of each discovered kind plus Certificates and (when present)
//! CertificateRequestPolicies, applies field redaction, and produces an
//! ordered bundle that serializes to either a YAML document stream or a
//! JSON `List` envelope. Both forms round-trip the same object set.
//!
//! The export refuses to run against a cluster whose `cert-manager.io`
//! CRDs do not serve `v1`: a backup taken through a different schema
//! version could not be guaranteed structurally consistent.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{CertopsError, Result};
use crate::issuers::{classify_crd_names, crd_descriptor, crd_names};
use crate::redact::RedactionList;
use crate::resource::{ResourceDescriptor, TypedClient};

/// The API group whose CRDs must serve v1 before any export
const CERT_MANAGER_GROUP: &str = "cert-manager.io";

/// The approver-policy group; policies are exported only when it is present
const APPROVER_POLICY_GROUP: &str = "policy.cert-manager.io";

/// What to include in an export; constructed once per command invocation
#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Export issuers of every installed kind
    pub include_issuers: bool,
    /// Export Certificates (minus ingress-shim-managed ones)
    pub include_certificates: bool,
    /// Export CertificateRequestPolicies when approver-policy is installed
    pub include_policies: bool,
    /// Strip server-managed fields from every exported object
    pub redact: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            include_issuers: true,
            include_certificates: true,
            include_policies: true,
            redact: true,
        }
    }
}

/// Serialization forms for a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormat {
    /// `---`-separated YAML document stream (order-preserving)
    Yaml,
    /// JSON `{apiVersion, kind: "List", items}` envelope
    Json,
}

/// An ordered sequence of exported objects
#[derive(Debug, Clone, Default)]
pub struct BackupBundle {
    items: Vec<Value>,
}

impl BackupBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one object, keeping insertion order
    pub fn push(&mut self, item: Value) {
        self.items.push(item);
    }

    /// Append a batch of objects
    pub fn extend(&mut self, items: impl IntoIterator<Item = Value>) {
        self.items.extend(items);
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serialize as a `---`-joined YAML document stream
    pub fn to_yaml(&self) -> Result<String> {
        let mut out = String::new();
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.push_str("---\n");
            }
            out.push_str(&serde_yaml::to_string(item)?);
        }
        Ok(out)
    }

    /// Serialize as a JSON `List` envelope
    pub fn to_json(&self) -> Result<String> {
        let envelope = json!({
            "apiVersion": "v1",
            "kind": "List",
            "items": self.items,
        });
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Serialize in the requested format
    pub fn serialize(&self, format: BackupFormat) -> Result<String> {
        match format {
            BackupFormat::Yaml => self.to_yaml(),
            BackupFormat::Json => self.to_json(),
        }
    }
}

/// A completed export: the bundle plus advisory findings
#[derive(Debug, Clone, Default)]
pub struct Backup {
    /// Exported objects in emission order
    pub bundle: BackupBundle,
    /// `namespace/name` of Certificates excluded because an Ingress owns
    /// them; surfaced so the operator knows they will be regenerated
    pub skipped_certificates: Vec<String>,
}

/// Orchestrates CRD discovery, issuer detection, and typed listing
pub struct BackupExporter {
    client: kube::Client,
    token: CancellationToken,
}

impl BackupExporter {
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            token: CancellationToken::new(),
        }
    }

    /// Attach a cooperative cancellation token to every cluster call
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Run the export sequence; every step aborts on error
    pub async fn export(&self, options: &BackupOptions) -> Result<Backup> {
        let crds = self
            .typed_client(crd_descriptor())
            .list(None, &RedactionList::none())
            .await?;
        ensure_cert_manager_v1(&crds)?;

        let redactions = if options.redact {
            RedactionList::default()
        } else {
            RedactionList::none()
        };

        let mut backup = Backup::default();

        if options.include_issuers {
            let mut kinds = classify_crd_names(crd_names(&crds));
            // The registry gives no ordering guarantee; sort for a
            // deterministic bundle.
            kinds.sort_by_key(|k| k.as_str());
            for kind in kinds {
                let items = self
                    .typed_client(kind.descriptor())
                    .list(None, &redactions)
                    .await?;
                backup.bundle.extend(items);
            }
        }

        if options.include_certificates {
            let items = self
                .typed_client(certificate_descriptor())
                .list(None, &redactions)
                .await?;
            let (kept, skipped) = filter_ingress_certificates(items);
            for cert in &skipped {
                tracing::warn!(
                    certificate = %cert,
                    "skipping ingress-managed certificate; it will be regenerated by ingress-shim"
                );
            }
            backup.bundle.extend(kept);
            backup.skipped_certificates = skipped;
        }

        if options.include_policies && has_group(&crds, APPROVER_POLICY_GROUP) {
            // Disaster-recovery data only; restore does not consume these.
            let items = self
                .typed_client(policy_descriptor())
                .list(None, &redactions)
                .await?;
            backup.bundle.extend(items);
        }

        Ok(backup)
    }

    fn typed_client(&self, descriptor: ResourceDescriptor) -> TypedClient {
        TypedClient::new(self.client.clone(), descriptor).with_cancellation(self.token.clone())
    }
}

/// Descriptor for cert-manager Certificates
pub fn certificate_descriptor() -> ResourceDescriptor {
    ResourceDescriptor::namespaced(CERT_MANAGER_GROUP, "v1", "Certificate", "certificates")
}

/// Descriptor for approver-policy CertificateRequestPolicies
pub fn policy_descriptor() -> ResourceDescriptor {
    ResourceDescriptor::cluster(
        APPROVER_POLICY_GROUP,
        "v1alpha1",
        "CertificateRequestPolicy",
        "certificaterequestpolicies",
    )
}

/// Verify that every installed cert-manager.io CRD serves API version v1
pub fn ensure_cert_manager_v1(crds: &[Value]) -> Result<()> {
    for crd in crds {
        let group = crd
            .pointer("/spec/group")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if group != CERT_MANAGER_GROUP {
            continue;
        }
        let serves_v1 = crd
            .pointer("/spec/versions")
            .and_then(Value::as_array)
            .map(|versions| {
                versions.iter().any(|v| {
                    v.get("name").and_then(Value::as_str) == Some("v1")
                        && v.get("served").and_then(Value::as_bool) == Some(true)
                })
            })
            .unwrap_or(false);
        if !serves_v1 {
            let name = crd
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .unwrap_or("<unnamed>");
            return Err(CertopsError::UnsupportedCrdVersion {
                crd: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Check whether any listed CRD belongs to the given API group
pub fn has_group(crds: &[Value], group: &str) -> bool {
    crds.iter()
        .any(|crd| crd.pointer("/spec/group").and_then(Value::as_str) == Some(group))
}

/// Does any owner reference on the object point at an Ingress?
fn is_ingress_owned(object: &Value) -> bool {
    object
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .map(|owners| {
            owners
                .iter()
                .any(|o| o.get("kind").and_then(Value::as_str) == Some("Ingress"))
        })
        .unwrap_or(false)
}

/// Split certificates into (exported, skipped `namespace/name`) by ingress
/// ownership. Exclusion is policy: ingress-shim recreates these on demand.
pub fn filter_ingress_certificates(items: Vec<Value>) -> (Vec<Value>, Vec<String>) {
    let mut kept = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    for item in items {
        if is_ingress_owned(&item) {
            let namespace = item
                .pointer("/metadata/namespace")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let name = item
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            skipped.push(format!("{}/{}", namespace, name));
        } else {
            kept.push(item);
        }
    }
    (kept, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    fn crd(name: &str, group: &str, versions: &[(&str, bool)]) -> Value {
        json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": {"name": name},
            "spec": {
                "group": group,
                "versions": versions.iter().map(|(v, served)| json!({
                    "name": v,
                    "served": served,
                })).collect::<Vec<_>>(),
            }
        })
    }

    #[test]
    fn test_v1_check_passes_on_served_v1() {
        let crds = vec![
            crd("issuers.cert-manager.io", "cert-manager.io", &[("v1", true)]),
            crd("foos.example.com", "example.com", &[("v1alpha1", true)]),
        ];
        assert!(ensure_cert_manager_v1(&crds).is_ok());
    }

    #[test]
    fn test_v1_check_fails_on_unserved_v1() {
        let crds = vec![crd(
            "certificates.cert-manager.io",
            "cert-manager.io",
            &[("v1alpha2", true), ("v1", false)],
        )];
        let err = ensure_cert_manager_v1(&crds).unwrap_err();
        match err {
            CertopsError::UnsupportedCrdVersion { crd } => {
                assert_eq!(crd, "certificates.cert-manager.io");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_v1_check_ignores_foreign_groups() {
        let crds = vec![crd("foos.example.com", "example.com", &[("v2", true)])];
        assert!(ensure_cert_manager_v1(&crds).is_ok());
    }

    #[test]
    fn test_has_group() {
        let crds = vec![crd(
            "certificaterequestpolicies.policy.cert-manager.io",
            "policy.cert-manager.io",
            &[("v1alpha1", true)],
        )];
        assert!(has_group(&crds, "policy.cert-manager.io"));
        assert!(!has_group(&crds, "cert-manager.io"));
    }

    fn certificate(namespace: &str, name: &str, owner_kind: Option<&str>) -> Value {
        let mut metadata = json!({"name": name, "namespace": namespace});
        if let Some(kind) = owner_kind {
            metadata["ownerReferences"] = json!([{"kind": kind, "name": "owner"}]);
        }
        json!({
            "apiVersion": "cert-manager.io/v1",
            "kind": "Certificate",
            "metadata": metadata,
            "spec": {"secretName": format!("{name}-tls")}
        })
    }

    #[test]
    fn test_ingress_owned_certificates_are_excluded() {
        let items = vec![
            certificate("web", "site-tls", Some("Ingress")),
            certificate("web", "api-tls", None),
            certificate("db", "pg-tls", Some("StatefulSet")),
        ];
        let (kept, skipped) = filter_ingress_certificates(items);
        assert_eq!(kept.len(), 2);
        assert_eq!(skipped, vec!["web/site-tls".to_string()]);
    }

    fn sample_bundle() -> BackupBundle {
        let mut bundle = BackupBundle::new();
        bundle.push(json!({
            "apiVersion": "cert-manager.io/v1",
            "kind": "Issuer",
            "metadata": {"name": "letsencrypt", "namespace": "default"},
            "spec": {"selfSigned": {}}
        }));
        bundle.push(json!({
            "apiVersion": "cert-manager.io/v1",
            "kind": "ClusterIssuer",
            "metadata": {"name": "internal-ca"},
            "spec": {"ca": {"secretName": "ca-key"}}
        }));
        bundle
    }

    #[tokio::test]
    async fn test_yaml_round_trip_preserves_order() {
        let bundle = sample_bundle();
        let yaml = bundle.to_yaml().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        scanner::for_each(yaml.as_bytes(), &CancellationToken::new(), move |doc| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(serde_json::to_value(&doc)?);
                Ok(())
            }
        })
        .await
        .unwrap();

        let parsed = seen.lock().unwrap().clone();
        assert_eq!(parsed, bundle.items());
    }

    #[tokio::test]
    async fn test_json_round_trip_reproduces_object_set() {
        let bundle = sample_bundle();
        let envelope: Value = serde_json::from_str(&bundle.to_json().unwrap()).unwrap();
        assert_eq!(envelope.get("kind").unwrap(), "List");
        assert_eq!(envelope.get("apiVersion").unwrap(), "v1");
        let items = envelope.get("items").unwrap().as_array().unwrap();
        assert_eq!(items.as_slice(), bundle.items());
    }

    #[test]
    fn test_empty_bundle_serializes_cleanly() {
        let bundle = BackupBundle::new();
        assert_eq!(bundle.to_yaml().unwrap(), "");
        let envelope: Value = serde_json::from_str(&bundle.to_json().unwrap()).unwrap();
        assert_eq!(envelope.get("items").unwrap().as_array().unwrap().len(), 0);
    }
}
