//! Field redaction for exported objects
//!
//! Backups strip server-managed and noisy fields so that the exported
//! manifests can be re-applied to another cluster without conflicts.
//! Redaction paths are JSON pointers (RFC 6901) and are applied uniformly
//! to every exported object regardless of kind.

use serde_json::Value;

/// Paths stripped from every exported object when redaction is enabled.
///
/// `~1` escapes `/` and `~0` escapes `~` inside a pointer token, so the
/// last entry targets the `kubectl.kubernetes.io/last-applied-configuration`
/// annotation.
pub const DEFAULT_REDACTIONS: &[&str] = &[
    "/metadata/creationTimestamp",
    "/metadata/generation",
    "/metadata/resourceVersion",
    "/metadata/uid",
    "/metadata/managedFields",
    "/status",
    "/metadata/annotations/kubectl.kubernetes.io~1last-applied-configuration",
];

/// An ordered set of JSON-pointer paths to strip from exported objects
#[derive(Debug, Clone)]
pub struct RedactionList {
    paths: Vec<String>,
}

impl Default for RedactionList {
    fn default() -> Self {
        Self {
            paths: DEFAULT_REDACTIONS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl RedactionList {
    /// An empty list; objects pass through untouched
    pub fn none() -> Self {
        Self { paths: Vec::new() }
    }

    /// Build a list from explicit pointer paths
    pub fn new(paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// The configured pointer paths, in application order
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Strip every configured path from the object in place.
    ///
    /// Missing paths are ignored; a pointer that traverses through a
    /// non-object value is ignored as well.
    pub fn apply(&self, value: &mut Value) {
        for path in &self.paths {
            remove_pointer(value, path);
        }
    }
}

/// Decode one pointer token: `~1` -> `/`, `~0` -> `~`
fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Remove the value addressed by a JSON pointer, if present
fn remove_pointer(value: &mut Value, pointer: &str) {
    let Some(rest) = pointer.strip_prefix('/') else {
        return;
    };
    let tokens: Vec<String> = rest.split('/').map(unescape_token).collect();
    let (last, parents) = match tokens.split_last() {
        Some(split) => split,
        None => return,
    };

    let mut current = value;
    for token in parents {
        match current {
            Value::Object(map) => match map.get_mut(token.as_str()) {
                Some(next) => current = next,
                None => return,
            },
            _ => return,
        }
    }

    if let Value::Object(map) = current {
        map.remove(last.as_str());
    }
}
