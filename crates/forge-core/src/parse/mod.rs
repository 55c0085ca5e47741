pub mod components;
pub mod operation;
pub mod server;
pub mod spec;

use std::fs;
use std::path::Path;

use crate::error::ParseError;
pub use operation::{HttpMethod, Operation, PathItem};
pub use spec::ApiDescription;

/// Parse an API description from YAML.
pub fn from_yaml(input: &str) -> Result<ApiDescription, ParseError> {
    let spec: ApiDescription = serde_yaml_ng::from_str(input)?;
    check_version(&spec);
    Ok(spec)
}

/// Parse an API description from JSON.
pub fn from_json(input: &str) -> Result<ApiDescription, ParseError> {
    let spec: ApiDescription = serde_json::from_str(input)?;
    check_version(&spec);
    Ok(spec)
}

/// Read and parse an API description, picking the format from the file extension.
pub fn load(path: &Path) -> Result<ApiDescription, ParseError> {
    let content = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => from_json(&content),
        _ => from_yaml(&content),
    }
}

// Generation still works on older or unversioned documents, so this only warns.
fn check_version(spec: &ApiDescription) {
    match spec.openapi.as_deref() {
        Some(v) if v.starts_with("3.") => {}
        Some(v) => log::warn!("unexpected OpenAPI version {v}, continuing anyway"),
        None => log::warn!("document has no `openapi` version field"),
    }
}
