//! Typed resources the restore path converts into
//!
//! Only the resources the operator can take over are modelled as concrete
//! structs: cert-manager `Issuer`/`ClusterIssuer` and the enhanced Venafi
//! issuers. Everything else stays generic. Decoding is strict (unknown
//! top-level fields are rejected) because a malformed core resource in a
//! backup means the backup itself is corrupt.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A namespaced cert-manager.io/v1 Issuer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Issuer {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

/// A cluster-scoped cert-manager.io/v1 ClusterIssuer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClusterIssuer {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

/// A namespaced jetstack.io VenafiIssuer (enhanced issuer)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VenafiIssuer {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

/// A cluster-scoped jetstack.io VenafiClusterIssuer (enhanced issuer)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VenafiClusterIssuer {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

macro_rules! impl_name {
    ($($ty:ty),+) => {
        $(impl $ty {
            /// The object name, or an empty string when metadata is incomplete
            pub fn name(&self) -> &str {
                self.metadata.name.as_deref().unwrap_or_default()
            }
        })+
    };
}

impl_name!(Issuer, ClusterIssuer, VenafiIssuer, VenafiClusterIssuer);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issuer_decodes_from_backup_document() {
        let issuer: Issuer = serde_json::from_value(json!({
            "apiVersion": "cert-manager.io/v1",
            "kind": "Issuer",
            "metadata": {"name": "letsencrypt", "namespace": "default"},
            "spec": {"acme": {"server": "https://acme-v02.api.letsencrypt.org/directory"}}
        }))
        .unwrap();
        assert_eq!(issuer.name(), "letsencrypt");
        assert!(issuer.status.is_none());
    }

    #[test]
    fn test_unknown_top_level_field_is_rejected() {
        let result: Result<ClusterIssuer, _> = serde_json::from_value(json!({
            "apiVersion": "cert-manager.io/v1",
            "kind": "ClusterIssuer",
            "metadata": {"name": "ca"},
            "spec": {},
            "extraField": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_round_trip_preserves_spec() {
        let original = json!({
            "apiVersion": "jetstack.io/v1alpha1",
            "kind": "VenafiIssuer",
            "metadata": {"name": "tpp", "namespace": "venafi"},
            "spec": {"tpp": {"url": "https://tpp.example.com"}}
        });
        let issuer: VenafiIssuer = serde_json::from_value(original.clone()).unwrap();
        let back = serde_json::to_value(&issuer).unwrap();
        assert_eq!(back.get("spec"), original.get("spec"));
        assert_eq!(back.get("kind"), original.get("kind"));
    }
}
