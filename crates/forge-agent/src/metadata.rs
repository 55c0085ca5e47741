use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::output;
use crate::repair::{RefineState, RepairAttempt, RepairReport};

pub const METADATA_FILE: &str = "metadata.json";

/// History of one generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationEntry {
    pub filename: String,
    pub initial_prompt: String,
    pub initial_response: String,
    pub refinements: Vec<RepairAttempt>,
    /// Absent for files generated outside the repair loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_state: Option<RefineState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_diagnostics: Option<String>,
}

impl GenerationEntry {
    pub fn new(filename: &str, initial_prompt: String, initial_response: String) -> Self {
        Self {
            filename: filename.to_string(),
            initial_prompt,
            initial_response,
            refinements: Vec::new(),
            terminal_state: None,
            final_diagnostics: None,
        }
    }

    pub fn apply(&mut self, report: RepairReport) {
        self.refinements = report.attempts;
        self.terminal_state = Some(report.terminal);
        self.final_diagnostics = report.final_diagnostics;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub stack: String,
    pub files: Vec<GenerationEntry>,
}

/// Collects entries in generation order and writes them to `metadata.json`.
#[derive(Debug)]
pub struct MetadataRecorder {
    metadata: Metadata,
}

impl MetadataRecorder {
    pub fn new(stack: &str) -> Self {
        Self {
            metadata: Metadata {
                stack: stack.to_string(),
                files: Vec::new(),
            },
        }
    }

    pub fn record(&mut self, entry: GenerationEntry) {
        self.metadata.files.push(entry);
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn persist(&self, root: &Path) -> Result<PathBuf, AgentError> {
        let path = root.join(METADATA_FILE);
        output::write_json(&path, &self.metadata)?;
        log::info!(
            "wrote metadata for {} file(s) to {}",
            self.metadata.files.len(),
            path.display()
        );
        Ok(path)
    }
}
