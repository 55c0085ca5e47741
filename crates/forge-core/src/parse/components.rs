use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Components object holding reusable definitions.
///
/// Schemas are kept as raw JSON: the generator forwards them verbatim and never
/// interprets them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Components {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub schemas: IndexMap<String, Value>,

    /// Responses, parameters, security schemes and anything else.
    #[serde(flatten)]
    pub other: IndexMap<String, Value>,
}
