//! Prompt templates for the FastAPI stack and their typed bindings.
//!
//! Every [`FileKind`] maps to exactly one template. Templates render with
//! strict undefined behaviour, so a placeholder without a bound value fails at
//! assembly time instead of producing a malformed request.

use forge_core::plan::{FileKind, FileSpec, Snippet};
use minijinja::{Environment, UndefinedBehavior, Value, context};
use serde::Serialize;

use crate::error::PromptError;

/// System message sent with every request.
pub const SYSTEM_PROMPT: &str = include_str!("../templates/system.txt");

/// Stack descriptor recorded in generation metadata.
pub const STACK: &str = "Python 3.10+ + FastAPI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    Models,
    Router,
    Entrypoint,
    Requirements,
    Dockerfile,
    Tests,
    Refine,
    RefineRouter,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 8] = [
        PromptTemplate::Models,
        PromptTemplate::Router,
        PromptTemplate::Entrypoint,
        PromptTemplate::Requirements,
        PromptTemplate::Dockerfile,
        PromptTemplate::Tests,
        PromptTemplate::Refine,
        PromptTemplate::RefineRouter,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PromptTemplate::Models => "models.py.j2",
            PromptTemplate::Router => "router.py.j2",
            PromptTemplate::Entrypoint => "main.py.j2",
            PromptTemplate::Requirements => "requirements.txt.j2",
            PromptTemplate::Dockerfile => "Dockerfile.j2",
            PromptTemplate::Tests => "test_api.py.j2",
            PromptTemplate::Refine => "refine.j2",
            PromptTemplate::RefineRouter => "refine_router.j2",
        }
    }

    fn source(self) -> &'static str {
        match self {
            PromptTemplate::Models => include_str!("../templates/models.py.j2"),
            PromptTemplate::Router => include_str!("../templates/router.py.j2"),
            PromptTemplate::Entrypoint => include_str!("../templates/main.py.j2"),
            PromptTemplate::Requirements => include_str!("../templates/requirements.txt.j2"),
            PromptTemplate::Dockerfile => include_str!("../templates/Dockerfile.j2"),
            PromptTemplate::Tests => include_str!("../templates/test_api.py.j2"),
            PromptTemplate::Refine => include_str!("../templates/refine.j2"),
            PromptTemplate::RefineRouter => include_str!("../templates/refine_router.j2"),
        }
    }

    /// The generation template bound to a planned file kind.
    pub fn for_kind(kind: &FileKind) -> Self {
        match kind {
            FileKind::Models => PromptTemplate::Models,
            FileKind::Router(_) => PromptTemplate::Router,
            FileKind::Entrypoint => PromptTemplate::Entrypoint,
            FileKind::Requirements => PromptTemplate::Requirements,
            FileKind::Dockerfile => PromptTemplate::Dockerfile,
            FileKind::Tests => PromptTemplate::Tests,
        }
    }
}

/// A fully bound request: the fixed system message plus the rendered user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptRequest {
    pub system: String,
    pub user: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptAssembler {
    env: Environment<'static>,
}

impl PromptAssembler {
    pub fn new() -> Result<Self, PromptError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        for template in PromptTemplate::ALL {
            env.add_template(template.name(), template.source())
                .map_err(|source| PromptError::Template {
                    template: template.name(),
                    source,
                })?;
        }
        Ok(Self { env })
    }

    /// Bind a planned file's snippet into its generation template.
    pub fn assemble(&self, file: &FileSpec, snippet: &Snippet) -> Result<PromptRequest, PromptError> {
        let ctx = match (&file.kind, snippet) {
            (FileKind::Models, Snippet::Schemas(_)) => context! {
                spec => snippet.to_json()?,
            },
            (FileKind::Router(ident), Snippet::Router(router)) => context! {
                tag => &ident.type_name,
                tag_lower => &ident.module,
                paths => to_json(&router.paths)?,
                schemas => to_json(&router.schemas)?,
            },
            (FileKind::Entrypoint, Snippet::Entrypoint(entry)) => context! {
                servers => to_json(&entry.servers)?,
                tags => to_json(&entry.tags)?,
                routers => &entry.routers,
            },
            (FileKind::Requirements, Snippet::Dependencies(deps)) => context! {
                deps => deps.join("\n"),
            },
            (FileKind::Dockerfile, Snippet::Empty {}) => context! {},
            (FileKind::Tests, Snippet::Document(_)) => context! {
                spec => snippet.to_json()?,
            },
            (kind, _) => {
                return Err(PromptError::SnippetMismatch {
                    path: file.relative_path.clone(),
                    category: kind.category(),
                });
            }
        };

        self.render(PromptTemplate::for_kind(&file.kind), ctx)
    }

    /// Request a repair of one file from checker diagnostics and its original snippet.
    pub fn refine(
        &self,
        filename: &str,
        code: &str,
        diagnostics: &str,
        snippet: &str,
    ) -> Result<PromptRequest, PromptError> {
        self.render(
            PromptTemplate::Refine,
            context! {
                filename => filename,
                code => code,
                diagnostics => diagnostics,
                snippet => snippet,
            },
        )
    }

    /// Request a repair of a router file from a test log and the whole document.
    ///
    /// Router identifiers are re-derived from the file path, which yields the
    /// same names the router was generated with.
    pub fn refine_router(
        &self,
        relative_path: &str,
        code: &str,
        errors: &str,
        spec: &str,
    ) -> Result<PromptRequest, PromptError> {
        let ident = match FileKind::classify(relative_path)? {
            FileKind::Router(ident) => ident,
            other => {
                return Err(PromptError::SnippetMismatch {
                    path: relative_path.to_string(),
                    category: other.category(),
                });
            }
        };

        self.render(
            PromptTemplate::RefineRouter,
            context! {
                tag => ident.type_name,
                tag_lower => ident.module,
                filename => relative_path,
                code => code,
                errors => errors,
                spec => spec,
            },
        )
    }

    fn render(&self, template: PromptTemplate, ctx: Value) -> Result<PromptRequest, PromptError> {
        let tmpl = self
            .env
            .get_template(template.name())
            .map_err(|source| PromptError::Template {
                template: template.name(),
                source,
            })?;
        let user = tmpl.render(ctx).map_err(|source| PromptError::Render {
            template: template.name(),
            source,
        })?;
        log::debug!("rendered {} ({} chars)", template.name(), user.len());

        Ok(PromptRequest {
            system: SYSTEM_PROMPT.trim().to_string(),
            user,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
