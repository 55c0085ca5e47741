use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AgentError;

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) -> Result<PathBuf, AgentError> {
    let path = root.join(relative);
    write_text(&path, content)?;
    Ok(path)
}

pub fn write_text(path: &Path, content: &str) -> Result<(), AgentError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| AgentError::Io {
            action: "create directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| AgentError::Io {
        action: "write",
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_text(path: &Path) -> Result<String, AgentError> {
    fs::read_to_string(path).map_err(|source| AgentError::Io {
        action: "read",
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty-printed JSON with a trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AgentError> {
    let mut buf = serde_json::to_string_pretty(value).map_err(|source| AgentError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    buf.push('\n');
    write_text(path, &buf)
}
