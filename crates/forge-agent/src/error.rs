use std::path::PathBuf;

use forge_core::{ParseError, PlanError};
use forge_fastapi::PromptError;
use thiserror::Error;

use crate::repair::RepairAttempt;

/// Failures of the text-generation backend.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend returned no message content")]
    EmptyResponse,
}

/// Failures to run the external checker. Diagnostics themselves are not errors.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("no checker command configured")]
    EmptyCommand,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("generation request failed: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A repair loop failed after it had already rewritten `path`.
    #[error("repair of {path} stopped after {} refinement(s): {source}", .attempts.len())]
    RepairInterrupted {
        path: String,
        attempts: Vec<RepairAttempt>,
        #[source]
        source: Box<AgentError>,
    },

    #[error("failed to serialize {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
