//! Registry of certificate-issuer CRDs
//!
//! Every externally-pluggable issuer integration the tooling understands is
//! listed here as one [`IssuerKind`] variant mapping to exactly one CRD
//! resource name. The list is closed at compile time; adding a provider
//! means adding a variant, its CRD name, and its resource descriptor.
//! Runtime dispatch is a table lookup, never open-ended reflection.

use std::collections::HashMap;

use kube::discovery::Scope;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::redact::RedactionList;
use crate::resource::{ResourceDescriptor, TypedClient};

/// All supported issuer CRDs, built-in and third-party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssuerKind {
    CertManagerIssuer,
    CertManagerClusterIssuer,
    VenafiIssuer,
    VenafiClusterIssuer,
    AwsPcaIssuer,
    AwsPcaClusterIssuer,
    KmsIssuer,
    GoogleCasIssuer,
    GoogleCasClusterIssuer,
    OriginCaIssuer,
    SmallStepIssuer,
    SmallStepClusterIssuer,
}

impl IssuerKind {
    /// Every registered kind, in declaration order
    pub const ALL: &'static [IssuerKind] = &[
        IssuerKind::CertManagerIssuer,
        IssuerKind::CertManagerClusterIssuer,
        IssuerKind::VenafiIssuer,
        IssuerKind::VenafiClusterIssuer,
        IssuerKind::AwsPcaIssuer,
        IssuerKind::AwsPcaClusterIssuer,
        IssuerKind::KmsIssuer,
        IssuerKind::GoogleCasIssuer,
        IssuerKind::GoogleCasClusterIssuer,
        IssuerKind::OriginCaIssuer,
        IssuerKind::SmallStepIssuer,
        IssuerKind::SmallStepClusterIssuer,
    ];

    /// The well-known CRD resource name this kind is detected by
    pub fn crd_name(&self) -> &'static str {
        match self {
            IssuerKind::CertManagerIssuer => "issuers.cert-manager.io",
            IssuerKind::CertManagerClusterIssuer => "clusterissuers.cert-manager.io",
            IssuerKind::VenafiIssuer => "venafiissuers.jetstack.io",
            IssuerKind::VenafiClusterIssuer => "venaficlusterissuers.jetstack.io",
            IssuerKind::AwsPcaIssuer => "awspcaissuers.awspca.cert-manager.io",
            IssuerKind::AwsPcaClusterIssuer => "awspcaclusterissuers.awspca.cert-manager.io",
            IssuerKind::KmsIssuer => "kmsissuers.cert-manager.skyscanner.net",
            IssuerKind::GoogleCasIssuer => "googlecasissuers.cas-issuer.jetstack.io",
            IssuerKind::GoogleCasClusterIssuer => {
                "googlecasclusterissuers.cas-issuer.jetstack.io"
            }
            IssuerKind::OriginCaIssuer => "originissuers.cert-manager.k8s.cloudflare.com",
            IssuerKind::SmallStepIssuer => "stepissuers.certmanager.step.sm",
            IssuerKind::SmallStepClusterIssuer => "stepclusterissuers.certmanager.step.sm",
        }
    }

    /// Stable string form, used by callers that need deterministic ordering
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuerKind::CertManagerIssuer => "Issuer",
            IssuerKind::CertManagerClusterIssuer => "ClusterIssuer",
            IssuerKind::VenafiIssuer => "VenafiIssuer",
            IssuerKind::VenafiClusterIssuer => "VenafiClusterIssuer",
            IssuerKind::AwsPcaIssuer => "AWSPCAIssuer",
            IssuerKind::AwsPcaClusterIssuer => "AWSPCAClusterIssuer",
            IssuerKind::KmsIssuer => "KMSIssuer",
            IssuerKind::GoogleCasIssuer => "GoogleCASIssuer",
            IssuerKind::GoogleCasClusterIssuer => "GoogleCASClusterIssuer",
            IssuerKind::OriginCaIssuer => "OriginIssuer",
            IssuerKind::SmallStepIssuer => "StepIssuer",
            IssuerKind::SmallStepClusterIssuer => "StepClusterIssuer",
        }
    }

    /// The resource descriptor for listing objects of this kind
    pub fn descriptor(&self) -> ResourceDescriptor {
        let (group, version) = match self {
            IssuerKind::CertManagerIssuer | IssuerKind::CertManagerClusterIssuer => {
                ("cert-manager.io", "v1")
            }
            IssuerKind::VenafiIssuer | IssuerKind::VenafiClusterIssuer => {
                ("jetstack.io", "v1alpha1")
            }
            IssuerKind::AwsPcaIssuer | IssuerKind::AwsPcaClusterIssuer => {
                ("awspca.cert-manager.io", "v1beta1")
            }
            IssuerKind::KmsIssuer => ("cert-manager.skyscanner.net", "v1alpha1"),
            IssuerKind::GoogleCasIssuer | IssuerKind::GoogleCasClusterIssuer => {
                ("cas-issuer.jetstack.io", "v1beta1")
            }
            IssuerKind::OriginCaIssuer => ("cert-manager.k8s.cloudflare.com", "v1"),
            IssuerKind::SmallStepIssuer | IssuerKind::SmallStepClusterIssuer => {
                ("certmanager.step.sm", "v1beta1")
            }
        };
        // CRD names are always `<plural>.<group>`
        let plural = self.crd_name().split('.').next().unwrap_or_default();
        match self.scope() {
            Scope::Namespaced => {
                ResourceDescriptor::namespaced(group, version, self.as_str(), plural)
            }
            Scope::Cluster => ResourceDescriptor::cluster(group, version, self.as_str(), plural),
        }
    }

    fn scope(&self) -> Scope {
        match self {
            IssuerKind::CertManagerClusterIssuer
            | IssuerKind::VenafiClusterIssuer
            | IssuerKind::AwsPcaClusterIssuer
            | IssuerKind::GoogleCasClusterIssuer
            | IssuerKind::SmallStepClusterIssuer => Scope::Cluster,
            _ => Scope::Namespaced,
        }
    }
}

impl std::fmt::Display for IssuerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor for the CRD resource itself
pub fn crd_descriptor() -> ResourceDescriptor {
    ResourceDescriptor::cluster(
        "apiextensions.k8s.io",
        "v1",
        "CustomResourceDefinition",
        "customresourcedefinitions",
    )
}

/// Map a list of CRD names onto the registered issuer kinds.
///
/// Unknown CRDs are ignored. No ordering guarantee; callers needing
/// determinism sort by [`IssuerKind::as_str`].
pub fn classify_crd_names<I, S>(names: I) -> Vec<IssuerKind>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let index: HashMap<&str, IssuerKind> = IssuerKind::ALL
        .iter()
        .map(|kind| (kind.crd_name(), *kind))
        .collect();
    names
        .into_iter()
        .filter_map(|name| index.get(name.as_ref()).copied())
        .collect()
}

/// Pull `metadata.name` out of each listed CRD object
pub(crate) fn crd_names(crds: &[Value]) -> Vec<&str> {
    crds.iter()
        .filter_map(|crd| crd.pointer("/metadata/name").and_then(Value::as_str))
        .collect()
}

/// Determine which issuer kinds are actually installed in the cluster.
///
/// Lists all CRDs once and matches their names against the registry. A
/// CRD-list failure aborts the whole operation: a wrong answer here would
/// silently drop real data from a backup.
pub async fn installed_issuer_kinds(
    client: kube::Client,
    token: CancellationToken,
) -> Result<Vec<IssuerKind>> {
    let crd_client = TypedClient::new(client, crd_descriptor()).with_cancellation(token);
    let crds = crd_client.list(None, &RedactionList::none()).await?;
    Ok(classify_crd_names(crd_names(&crds)))
}
