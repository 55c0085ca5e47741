use forge_core::PlanError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template {template} is not registered: {source}")]
    Template {
        template: &'static str,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to render {template}: {source}")]
    Render {
        template: &'static str,
        #[source]
        source: minijinja::Error,
    },

    #[error("{path}: {category} file was planned with a snippet it cannot bind")]
    SnippetMismatch { path: String, category: &'static str },

    #[error("failed to serialize snippet: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Plan(#[from] PlanError),
}
