//! Typed resource clients bound to a single (group, version, kind) triple
//!
//! A [`ResourceDescriptor`] is an immutable description of one API resource;
//! a [`TypedClient`] pairs it with a Kubernetes client and exposes the three
//! queries the pipeline needs: get, list, and a presence check. HTTP 404 is
//! converted to a typed not-found signal at this boundary so callers never
//! string-match status text.

use kube::api::{Api, DynamicObject};
use kube::core::ApiResource;
use kube::discovery::Scope;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{CertopsError, Result};
use crate::redact::RedactionList;

/// Immutable description of one API resource, used to build REST paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// API group, empty for the core group
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Kind name, e.g. `Issuer`
    pub kind: String,
    /// Plural resource name, e.g. `issuers`
    pub plural: String,
    /// Whether instances live in a namespace or at cluster scope
    pub scope: Scope,
}

impl ResourceDescriptor {
    /// Describe a namespaced resource
    pub fn namespaced(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
            scope: Scope::Namespaced,
        }
    }

    /// Describe a cluster-scoped resource
    pub fn cluster(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
            scope: Scope::Cluster,
        }
    }

    /// The `group/version` string, or bare version for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Normalize a caller-supplied namespace against the descriptor scope.
    ///
    /// Cluster-scoped resources have no namespace in their request path, so
    /// any namespace a caller supplies is dropped rather than rejected.
    pub fn request_namespace<'a>(&self, namespace: Option<&'a str>) -> Option<&'a str> {
        match self.scope {
            Scope::Cluster => None,
            Scope::Namespaced => namespace,
        }
    }

    /// Build the kube `ApiResource` for this descriptor
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

/// A client bound to one resource descriptor
#[derive(Clone)]
pub struct TypedClient {
    client: kube::Client,
    descriptor: ResourceDescriptor,
    token: CancellationToken,
}

impl TypedClient {
    /// Create a client for a descriptor; never cancelled unless a token is
    /// attached with [`TypedClient::with_cancellation`]
    pub fn new(client: kube::Client, descriptor: ResourceDescriptor) -> Self {
        Self {
            client,
            descriptor,
            token: CancellationToken::new(),
        }
    }

    /// Attach a cooperative cancellation token to every request
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// The descriptor this client is bound to
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Fetch one object by name.
    ///
    /// A 404 response maps to [`CertopsError::NotFound`] carrying the kind
    /// and name; transport errors propagate verbatim.
    pub async fn get(&self, name: &str, namespace: Option<&str>) -> Result<DynamicObject> {
        let api = self.api_for(namespace);
        let request = api.get(name);
        let result = tokio::select! {
            _ = self.token.cancelled() => return Err(CertopsError::Cancelled),
            result = request => result,
        };
        match result {
            Ok(obj) => Ok(obj),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Err(CertopsError::NotFound {
                kind: self.descriptor.kind.clone(),
                name: name.to_string(),
            }),
            Err(e) => Err(CertopsError::Api(e)),
        }
    }

    /// List every object of this resource, with redaction paths stripped
    /// from each item.
    ///
    /// The list request is unfiltered; large types return the full set.
    pub async fn list(
        &self,
        namespace: Option<&str>,
        redactions: &RedactionList,
    ) -> Result<Vec<Value>> {
        let api = self.api_for(namespace);
        let params = Default::default();
        let request = api.list(&params);
        let list = tokio::select! {
            _ = self.token.cancelled() => return Err(CertopsError::Cancelled),
            result = request => result.map_err(CertopsError::Api)?,
        };

        let mut items = Vec::with_capacity(list.items.len());
        for obj in list.items {
            let mut value = serde_json::to_value(&obj)?;
            // List responses omit per-item type metadata; reinstate it so
            // exported documents stand alone.
            if let Value::Object(map) = &mut value {
                map.insert("apiVersion".into(), Value::String(self.descriptor.api_version()));
                map.insert("kind".into(), Value::String(self.descriptor.kind.clone()));
            }
            redactions.apply(&mut value);
            items.push(value);
        }
        Ok(items)
    }

    /// Check whether an object exists; 404 is `false`, not an error
    pub async fn present(&self, name: &str, namespace: Option<&str>) -> Result<bool> {
        match self.get(name, namespace).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn api_for(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = self.descriptor.api_resource();
        match self.descriptor.request_namespace(namespace) {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_with_group() {
        let d = ResourceDescriptor::namespaced("cert-manager.io", "v1", "Issuer", "issuers");
        assert_eq!(d.api_version(), "cert-manager.io/v1");
    }

    #[test]
    fn test_api_version_core_group() {
        let d = ResourceDescriptor::namespaced("", "v1", "Secret", "secrets");
        assert_eq!(d.api_version(), "v1");
    }

    #[test]
    fn test_cluster_scope_drops_namespace() {
        let d = ResourceDescriptor::cluster(
            "cert-manager.io",
            "v1",
            "ClusterIssuer",
            "clusterissuers",
        );
        // Normalization, not an error: the namespace is simply ignored
        assert_eq!(d.request_namespace(Some("default")), None);
        assert_eq!(d.request_namespace(None), None);
    }

    #[test]
    fn test_namespaced_scope_keeps_namespace() {
        let d = ResourceDescriptor::namespaced("cert-manager.io", "v1", "Issuer", "issuers");
        assert_eq!(d.request_namespace(Some("tls")), Some("tls"));
        assert_eq!(d.request_namespace(None), None);
    }

    #[test]
    fn test_api_resource_fields() {
        let d = ResourceDescriptor::cluster(
            "apiextensions.k8s.io",
            "v1",
            "CustomResourceDefinition",
            "customresourcedefinitions",
        );
        let ar = d.api_resource();
        assert_eq!(ar.group, "apiextensions.k8s.io");
        assert_eq!(ar.api_version, "apiextensions.k8s.io/v1");
        assert_eq!(ar.plural, "customresourcedefinitions");
        assert_eq!(ar.kind, "CustomResourceDefinition");
    }
}
