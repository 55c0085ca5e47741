use std::collections::BTreeSet;

use serde::Serialize;

use crate::parse::{ApiDescription, Operation};

/// Paths under this prefix name their resource in the next segment.
pub const API_ROOT: &str = "/api/";

/// Tag used when neither declared tags nor `/api/` resources exist.
pub const DEFAULT_TAG: &str = "default";

/// Where a run's tags came from. This also decides which operations a tag owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSource {
    /// Union of the tags declared on operations.
    Declared,
    /// Resource segments of `/api/<resource>` paths.
    PathSegment,
    /// The single synthetic `default` tag covering every path.
    Synthetic,
}

/// The sorted tag set of one description. Computed once per plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSet {
    pub source: TagSource,
    pub tags: Vec<String>,
}

impl TagSet {
    pub fn derive(spec: &ApiDescription) -> Self {
        let declared: BTreeSet<&str> = spec
            .path_items()
            .flat_map(|(_, item)| item.operations.values())
            .flat_map(|op| op.tags.iter().map(String::as_str))
            .collect();
        if !declared.is_empty() {
            return Self {
                source: TagSource::Declared,
                tags: declared.into_iter().map(str::to_string).collect(),
            };
        }

        let resources: BTreeSet<&str> = spec
            .path_items()
            .filter_map(|(path, _)| resource_segment(path))
            .collect();
        if !resources.is_empty() {
            return Self {
                source: TagSource::PathSegment,
                tags: resources.into_iter().map(str::to_string).collect(),
            };
        }

        Self {
            source: TagSource::Synthetic,
            tags: vec![DEFAULT_TAG.to_string()],
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == TagSource::Synthetic
    }
}

impl TagSource {
    /// Whether `op` at `path` belongs to the router generated for `tag`.
    pub fn owns(self, tag: &str, path: &str, op: &Operation) -> bool {
        match self {
            TagSource::Declared => op.has_tag(tag),
            TagSource::PathSegment => resource_segment(path) == Some(tag),
            TagSource::Synthetic => true,
        }
    }
}

/// Extract the resource name following the API root.
/// e.g. "/api/notes/{id}" → "notes", "/pets" → None
pub fn resource_segment(path: &str) -> Option<&str> {
    path.strip_prefix(API_ROOT)?
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
}
