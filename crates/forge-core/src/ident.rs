use heck::{ToPascalCase, ToSnakeCase};
use serde::Serialize;

/// Identifiers derived for one router file.
///
/// `module` is the lower-cased form used for the file name, the URL prefix and
/// the in-memory store name; `type_name` is the capitalized prefix of the model
/// names. Both are computed from `module`, so deriving from a tag and deriving
/// from the file written for that tag always agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RouterIdent {
    pub tag: String,
    pub module: String,
    pub type_name: String,
}

impl RouterIdent {
    pub fn from_tag(tag: &str) -> Self {
        Self::with_module(tag, sanitize_identifier(tag).to_snake_case())
    }

    /// Re-derive identifiers from a router file stem such as `notes` or `pet_store`.
    pub fn from_file_stem(stem: &str) -> Self {
        Self::with_module(stem, sanitize_identifier(stem).to_snake_case())
    }

    fn with_module(tag: &str, module: String) -> Self {
        let module = if module.is_empty() {
            "unnamed".to_string()
        } else {
            module
        };
        Self {
            tag: tag.to_string(),
            type_name: module.to_pascal_case(),
            module,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.py", self.module)
    }
}

/// Replace runs of non-alphanumeric characters with a single `_`.
fn sanitize_identifier(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_was_separator = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if prev_was_separator && !result.is_empty() {
                result.push('_');
            }
            result.push(ch);
            prev_was_separator = false;
        } else {
            prev_was_separator = true;
        }
    }

    result
}
