use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Lifecycle of one generated file inside a repair loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineState {
    Generated,
    Evaluating,
    Refining,
    Accepted,
    Exhausted,
}

/// A file already written under `root`, ready to be repaired.
#[derive(Debug, Clone, Copy)]
pub struct RepairTarget<'a> {
    pub root: &'a Path,
    pub relative_path: &'a str,
    /// Serialized context bound into repair prompts.
    pub snippet: &'a str,
}

impl RepairTarget<'_> {
    pub fn path(&self) -> PathBuf {
        self.root.join(self.relative_path)
    }
}

/// One repair request and what came back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub attempt: u32,
    pub prompt: String,
    pub response: String,
    /// Diagnostic text that triggered the request.
    pub diagnostics: String,
    /// Whether the trimmed response differs from the trimmed file it replaced.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub terminal: RefineState,
    /// Every state visited, starting with `Generated`.
    ///
    /// The blanket policy has no evaluation step, so it reports
    /// `Generated → Refining → Accepted` without passing through `Evaluating`.
    pub transitions: Vec<RefineState>,
    pub attempts: Vec<RepairAttempt>,
    /// Last diagnostic text, kept when the loop gave up.
    pub final_diagnostics: Option<String>,
}

/// Policy that drives a generated file toward acceptance.
pub trait RepairStrategy {
    fn repair(&self, target: &RepairTarget<'_>) -> Result<RepairReport, AgentError>;
}
