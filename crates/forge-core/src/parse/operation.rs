use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// HTTP methods that produce operations. Any other key under a path is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
        }
    }

    /// Case-insensitive lookup of a path item key.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An API operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "operationId", default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Value>,

    #[serde(rename = "requestBody", default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub responses: IndexMap<String, Value>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Operation {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Schema names referenced from the request body.
    pub fn request_schema_refs(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        if let Some(body) = &self.request_body {
            collect_schema_refs(body, &mut refs);
        }
        refs
    }

    /// Schema names referenced from any response.
    pub fn response_schema_refs(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        for response in self.responses.values() {
            collect_schema_refs(response, &mut refs);
        }
        refs
    }
}

const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

fn collect_schema_refs(value: &Value, refs: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                match (key.as_str(), inner) {
                    ("$ref", Value::String(target)) => {
                        if let Some(name) = target.strip_prefix(SCHEMA_REF_PREFIX) {
                            refs.insert(name.to_string());
                        }
                    }
                    _ => collect_schema_refs(inner, refs),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_schema_refs(item, refs);
            }
        }
        _ => {}
    }
}

/// A path item: operations keyed by recognized method, plus everything else.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathItem {
    pub operations: IndexMap<HttpMethod, Operation>,

    /// Shared parameters, unrecognized methods such as `trace`, extensions, and
    /// method keys whose value is not a mapping.
    pub other: IndexMap<String, Value>,
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        self.operations.get(&method)
    }
}

impl<'de> Deserialize<'de> for PathItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = IndexMap::<String, Value>::deserialize(deserializer)?;
        let mut item = PathItem::default();

        for (key, value) in raw {
            match HttpMethod::parse(&key) {
                Some(method) if value.is_object() => {
                    let op: Operation = serde_json::from_value(value)
                        .map_err(|e| D::Error::custom(format!("operation `{key}`: {e}")))?;
                    item.operations.insert(method, op);
                }
                _ => {
                    item.other.insert(key, value);
                }
            }
        }

        Ok(item)
    }
}

impl Serialize for PathItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.operations.len() + self.other.len()))?;
        for (method, op) in &self.operations {
            map.serialize_entry(method.as_str(), op)?;
        }
        for (key, value) in &self.other {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
