use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A server URL definition, passed through to the entrypoint prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// URL template variables, kept as written.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, Value>,
}
