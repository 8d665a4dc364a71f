use serde::{Deserialize, Serialize};

/// Identifies one live object managed by an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    /// Empty for the core API group.
    #[serde(default)]
    pub group: String,
}

impl ResourceRef {
    /// Query parameters the application resource endpoints use to address
    /// this object (`/logs`, `/resource/actions`).
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("namespace", self.namespace.clone()),
            ("resourceName", self.name.clone()),
            ("group", self.group.clone()),
            ("kind", self.kind.clone()),
            ("version", self.version.clone()),
        ]
    }
}
