use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Typed view over an Argo CD application document.
///
/// Only the fields used for listing filters are modelled and every one of them
/// is optional: a partial or oddly shaped document never fails to load. Each
/// field that is missing or has an unexpected type reads as empty on its own,
/// without affecting its siblings. The backend document itself stays with the caller and is
/// returned untouched; this view is read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<ApplicationMetadata>,
    #[serde(default, deserialize_with = "lenient")]
    pub spec: Option<ApplicationSpec>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub namespace: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    #[serde(default, deserialize_with = "lenient")]
    pub project: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub destination: Option<ApplicationDestination>,
}

/// Target cluster and namespace of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDestination {
    #[serde(default, deserialize_with = "lenient")]
    pub server: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub namespace: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub health: Option<StatusCode>,
    #[serde(default, deserialize_with = "lenient")]
    pub sync: Option<StatusCode>,
}

/// `{ "status": "Healthy" }` style wrapper used by both health and sync status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
}

/// Field deserializer that maps a wrongly typed value to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

impl Application {
    /// Builds the view from a raw backend document. A document that is not an
    /// object produces an empty view instead of an error.
    pub fn from_document(document: &Value) -> Self {
        Self::deserialize(document).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.name.as_deref())
            .unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.namespace.as_deref())
            .unwrap_or_default()
    }

    /// Value of a label, `None` when the label (or the whole label map) is absent.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.labels.as_ref())
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    pub fn project(&self) -> &str {
        self.spec
            .as_ref()
            .and_then(|s| s.project.as_deref())
            .unwrap_or_default()
    }

    pub fn destination_namespace(&self) -> &str {
        self.destination()
            .and_then(|d| d.namespace.as_deref())
            .unwrap_or_default()
    }

    pub fn destination_server(&self) -> &str {
        self.destination()
            .and_then(|d| d.server.as_deref())
            .unwrap_or_default()
    }

    pub fn destination_name(&self) -> &str {
        self.destination()
            .and_then(|d| d.name.as_deref())
            .unwrap_or_default()
    }

    pub fn health_status(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status.as_deref())
            .unwrap_or_default()
    }

    pub fn sync_status(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|s| s.sync.as_ref())
            .and_then(|s| s.status.as_deref())
            .unwrap_or_default()
    }

    fn destination(&self) -> Option<&ApplicationDestination> {
        self.spec.as_ref().and_then(|s| s.destination.as_ref())
    }
}
