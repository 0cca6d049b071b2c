//! Idempotent apply of manifest streams against a cluster
//!
//! Each document goes through a small per-document state machine:
//! resolve its group/kind against discovery, attempt a Create, and on
//! AlreadyExists fall through to a force server-side-apply Patch under a
//! fixed field manager. Re-running an unmodified manifest is therefore a
//! no-op from the user's perspective. Any other error is terminal: the
//! batch aborts at the first failure and already-applied documents stay
//! applied (no rollback).
//!
//! Documents are applied strictly in stream order; installation manifests
//! rely on this to place Secrets before their consumers.

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, GroupVersionKind, TypeMeta};
use kube::discovery::{Discovery, Scope};
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

use crate::error::{CertopsError, Result};
use crate::scanner;

/// Field manager identity for server-side apply
pub const FIELD_MANAGER: &str = "certops";

/// Outcome of attempting to create one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The resource did not exist and was created
    Created,
    /// The server reported AlreadyExists; the caller should patch
    AlreadyExists,
}

/// A resolved document, ready for cluster calls
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub obj: DynamicObject,
    pub api_resource: ApiResource,
    pub scope: Scope,
}

impl ResolvedDocument {
    /// Display name for error messages: `[namespace/]Kind/name`
    pub fn display_name(&self) -> String {
        let name = self.obj.metadata.name.as_deref().unwrap_or("unnamed");
        match &self.obj.metadata.namespace {
            Some(ns) => format!("{}/{}/{}", ns, self.api_resource.kind, name),
            None => format!("{}/{}", self.api_resource.kind, name),
        }
    }
}

/// Cluster seam for the apply engine.
///
/// The production implementation talks to a real API server; tests use
/// [`MockApplyClient`] to exercise the engine without a cluster.
#[async_trait]
pub trait ApplyClient: Send + Sync {
    /// Resolve a document's apiVersion/kind to a concrete resource and scope
    async fn resolve(&self, types: &TypeMeta) -> Result<(ApiResource, Scope)>;

    /// Attempt to create the resource
    async fn create(&self, doc: &ResolvedDocument) -> Result<CreateOutcome>;

    /// Force server-side-apply the resource under the fixed field manager
    async fn patch(&self, doc: &ResolvedDocument) -> Result<()>;
}

/// Discovery-backed implementation of [`ApplyClient`]
pub struct ClusterApplyClient {
    client: kube::Client,
    discovery: Discovery,
}

impl ClusterApplyClient {
    /// Run API discovery once and keep the result for GVK resolution
    pub async fn new(client: kube::Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        Ok(Self { client, discovery })
    }

    fn api_for(&self, doc: &ResolvedDocument) -> Api<DynamicObject> {
        if doc.scope == Scope::Namespaced {
            let ns = doc.obj.metadata.namespace.as_deref().unwrap_or("default");
            Api::namespaced_with(self.client.clone(), ns, &doc.api_resource)
        } else {
            Api::all_with(self.client.clone(), &doc.api_resource)
        }
    }
}

#[async_trait]
impl ApplyClient for ClusterApplyClient {
    async fn resolve(&self, types: &TypeMeta) -> Result<(ApiResource, Scope)> {
        let gvk = gvk_from_type_meta(types);
        let (api_resource, capabilities) =
            self.discovery
                .resolve_gvk(&gvk)
                .ok_or_else(|| CertopsError::UnknownResourceType {
                    api_version: types.api_version.clone(),
                    kind: types.kind.clone(),
                })?;
        Ok((api_resource, capabilities.scope))
    }

    async fn create(&self, doc: &ResolvedDocument) -> Result<CreateOutcome> {
        let api = self.api_for(doc);
        match api.create(&PostParams::default(), &doc.obj).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(kube::Error::Api(resp)) if resp.code == 409 || resp.reason == "AlreadyExists" => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(CertopsError::ApplyFailed {
                resource: doc.display_name(),
                message: e.to_string(),
            }),
        }
    }

    async fn patch(&self, doc: &ResolvedDocument) -> Result<()> {
        let name = doc
            .obj
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| CertopsError::InvalidDocument("resource missing metadata.name".into()))?;
        let api = self.api_for(doc);
        let mut params = PatchParams::apply(FIELD_MANAGER);
        params.force = true;
        api.patch(name, &params, &Patch::Apply(&doc.obj))
            .await
            .map_err(|e| CertopsError::ApplyFailed {
                resource: doc.display_name(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// What happened to each document in a completed run
#[derive(Debug, Clone, Default)]
pub struct ApplySummary {
    /// Documents that were created, in stream order
    pub created: Vec<String>,
    /// Documents that already existed and were patched, in stream order
    pub patched: Vec<String>,
}

impl ApplySummary {
    /// Total number of documents applied
    pub fn total(&self) -> usize {
        self.created.len() + self.patched.len()
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} created, {} configured",
            self.created.len(),
            self.patched.len()
        )
    }
}

/// The reconcile engine itself, generic over the cluster seam
pub struct ApplyEngine<C: ApplyClient> {
    client: C,
    token: CancellationToken,
}

impl<C: ApplyClient> ApplyEngine<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            token: CancellationToken::new(),
        }
    }

    /// Attach a cooperative cancellation token; cancellation aborts before
    /// the next document's request but does not roll back applied documents
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Apply every document in the stream, strictly in stream order.
    ///
    /// The first failing document aborts the whole batch; documents applied
    /// before it remain applied.
    pub async fn apply_stream<R>(&self, reader: R) -> Result<ApplySummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let summary = std::sync::Mutex::new(ApplySummary::default());
        let summary_ref = &summary;
        scanner::for_each(reader, &self.token, move |doc| async move {
            let (name, outcome) = self.apply_document(doc).await?;
            let mut summary = summary_ref.lock().unwrap();
            match outcome {
                CreateOutcome::Created => summary.created.push(name),
                CreateOutcome::AlreadyExists => summary.patched.push(name),
            }
            Ok(())
        })
        .await?;
        Ok(summary.into_inner().unwrap())
    }

    /// Apply one document: Create, then Patch on AlreadyExists
    async fn apply_document(&self, doc: DynamicObject) -> Result<(String, CreateOutcome)> {
        let types = doc.types.clone().ok_or_else(|| {
            CertopsError::InvalidDocument("resource missing apiVersion or kind".into())
        })?;
        let (api_resource, scope) = self.client.resolve(&types).await?;
        let resolved = ResolvedDocument {
            obj: doc,
            api_resource,
            scope,
        };
        let name = resolved.display_name();

        match self.client.create(&resolved).await? {
            CreateOutcome::Created => {
                tracing::debug!(resource = %name, "created");
                Ok((name, CreateOutcome::Created))
            }
            CreateOutcome::AlreadyExists => {
                self.client.patch(&resolved).await?;
                tracing::debug!(resource = %name, "configured");
                Ok((name, CreateOutcome::AlreadyExists))
            }
        }
    }
}

/// Convert TypeMeta to a GroupVersionKind.
///
/// `apps/v1` -> group `apps`, version `v1`; a bare `v1` is the core group.
pub fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = match tm.api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), tm.api_version.clone()),
    };
    GroupVersionKind {
        group,
        version,
        kind: tm.kind.clone(),
    }
}

/// In-memory [`ApplyClient`] for tests: resolves any document to a synthetic
/// resource and records create/patch traffic.
#[derive(Default)]
pub struct MockApplyClient {
    state: std::sync::Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    objects: std::collections::BTreeMap<String, DynamicObject>,
    creates: usize,
    patches: usize,
    /// Names for which create must fail outright
    poisoned: std::collections::BTreeSet<String>,
}

impl MockApplyClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make create/patch of the named resource fail
    pub fn poison(&self, name: &str) {
        self.state.lock().unwrap().poisoned.insert(name.to_string());
    }

    /// (creates, patches) issued so far
    pub fn counts(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.creates, state.patches)
    }

    /// Names of stored objects, in key order
    pub fn stored(&self) -> Vec<String> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    fn key(doc: &ResolvedDocument) -> String {
        doc.display_name()
    }
}

#[async_trait]
impl ApplyClient for MockApplyClient {
    async fn resolve(&self, types: &TypeMeta) -> Result<(ApiResource, Scope)> {
        let gvk = gvk_from_type_meta(types);
        let api_resource = ApiResource::from_gvk(&gvk);
        // Kinds named Cluster* are treated as cluster-scoped, the rest as
        // namespaced; close enough for engine tests.
        let scope = if gvk.kind.starts_with("Cluster") {
            Scope::Cluster
        } else {
            Scope::Namespaced
        };
        Ok((api_resource, scope))
    }

    async fn create(&self, doc: &ResolvedDocument) -> Result<CreateOutcome> {
        let key = Self::key(doc);
        let mut state = self.state.lock().unwrap();
        if state.poisoned.contains(&key) {
            return Err(CertopsError::ApplyFailed {
                resource: key,
                message: "injected failure".into(),
            });
        }
        if state.objects.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        state.creates += 1;
        state.objects.insert(key, doc.obj.clone());
        Ok(CreateOutcome::Created)
    }

    async fn patch(&self, doc: &ResolvedDocument) -> Result<()> {
        let key = Self::key(doc);
        let mut state = self.state.lock().unwrap();
        if state.poisoned.contains(&key) {
            return Err(CertopsError::ApplyFailed {
                resource: key,
                message: "injected failure".into(),
            });
        }
        state.patches += 1;
        state.objects.insert(key, doc.obj.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
apiVersion: v1
kind: Secret
metadata:
  name: operator-key
  namespace: certops
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: operator
  namespace: certops
---
apiVersion: cert-manager.io/v1
kind: ClusterIssuer
metadata:
  name: default-ca
";

    #[tokio::test]
    async fn test_first_run_creates_everything() {
        let engine = ApplyEngine::new(MockApplyClient::new());
        let summary = engine.apply_stream(MANIFEST.as_bytes()).await.unwrap();
        assert_eq!(summary.created.len(), 3);
        assert!(summary.patched.is_empty());
        // Stream order preserved: the Secret lands before its consumers
        assert_eq!(summary.created[0], "certops/Secret/operator-key");
        assert_eq!(summary.created[1], "certops/Deployment/operator");
        assert_eq!(summary.created[2], "ClusterIssuer/default-ca");
    }

    #[tokio::test]
    async fn test_second_run_only_patches() {
        let engine = ApplyEngine::new(MockApplyClient::new());
        engine.apply_stream(MANIFEST.as_bytes()).await.unwrap();

        let summary = engine.apply_stream(MANIFEST.as_bytes()).await.unwrap();
        assert!(summary.created.is_empty());
        assert_eq!(summary.patched.len(), 3);
        assert_eq!(summary.summary(), "0 created, 3 configured");

        // Idempotence at the wire level: the second run issued no
        // successful creates, only patches.
        assert_eq!(engine.client.counts(), (3, 3));
    }

    #[tokio::test]
    async fn test_failure_aborts_batch_without_rollback() {
        let client = MockApplyClient::new();
        client.poison("certops/Deployment/operator");
        let engine = ApplyEngine::new(client);

        let err = engine.apply_stream(MANIFEST.as_bytes()).await.unwrap_err();
        assert!(matches!(err, CertopsError::ApplyFailed { .. }));

        // The Secret applied before the failure stays applied; the
        // ClusterIssuer after it was never attempted.
        let stored = engine.client.stored();
        assert_eq!(stored, vec!["certops/Secret/operator-key".to_string()]);
    }

    #[tokio::test]
    async fn test_document_without_type_meta_is_invalid() {
        let engine = ApplyEngine::new(MockApplyClient::new());
        let err = engine
            .apply_stream("metadata:\n  name: orphan\n".as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, CertopsError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_before_next_document() {
        let token = CancellationToken::new();
        token.cancel();
        let engine = ApplyEngine::new(MockApplyClient::new()).with_cancellation(token);
        let err = engine.apply_stream(MANIFEST.as_bytes()).await.unwrap_err();
        assert!(matches!(err, CertopsError::Cancelled));
    }

    #[test]
    fn test_gvk_from_type_meta() {
        let tm = TypeMeta {
            api_version: "cert-manager.io/v1".to_string(),
            kind: "Issuer".to_string(),
        };
        let gvk = gvk_from_type_meta(&tm);
        assert_eq!(gvk.group, "cert-manager.io");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "Issuer");

        let core = TypeMeta {
            api_version: "v1".to_string(),
            kind: "Secret".to_string(),
        };
        let gvk = gvk_from_type_meta(&core);
        assert_eq!(gvk.group, "");
        assert_eq!(gvk.version, "v1");
    }
}
