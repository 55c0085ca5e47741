use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::components::Components;
use super::operation::PathItem;
use super::server::Server;

/// A loaded API description.
///
/// Only the parts that drive planning are typed; everything else is kept in
/// `extra` so the whole document can be handed back to prompts unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openapi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,

    /// `None` when the document has no `paths` key at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<IndexMap<String, PathItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ApiDescription {
    /// Iterate path items in document order.
    pub fn path_items(&self) -> impl Iterator<Item = (&String, &PathItem)> {
        self.paths.iter().flat_map(|paths| paths.iter())
    }

    /// The reusable schema definitions, empty when the document declares none.
    pub fn schemas(&self) -> IndexMap<String, Value> {
        self.components
            .as_ref()
            .map(|c| c.schemas.clone())
            .unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        self.info
            .as_ref()
            .and_then(|info| info.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}
