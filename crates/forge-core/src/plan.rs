use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::PlanError;
use crate::ident::RouterIdent;
use crate::parse::server::Server;
use crate::parse::{ApiDescription, HttpMethod, Operation};
use crate::tags::{DEFAULT_TAG, TagSet, TagSource};

pub const MODELS_PATH: &str = "app/models.py";
pub const ROUTES_DIR: &str = "app/routes";
pub const ENTRYPOINT_PATH: &str = "app/main.py";
pub const REQUIREMENTS_PATH: &str = "requirements.txt";
pub const DOCKERFILE_PATH: &str = "Dockerfile";
pub const TESTS_PATH: &str = "tests/test_api.py";

/// File stem of the single router written for the synthetic default tag.
pub const DEFAULT_ROUTER_STEM: &str = "routes";

/// Packages listed in the dependency manifest.
pub const DEPENDENCIES: [&str; 3] = ["fastapi", "uvicorn", "pydantic"];

/// What a planned file is. Each kind is bound to exactly one prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileKind {
    Models,
    Router(RouterIdent),
    Entrypoint,
    Requirements,
    Dockerfile,
    Tests,
}

impl FileKind {
    pub fn category(&self) -> &'static str {
        match self {
            FileKind::Models => "models",
            FileKind::Router(_) => "router",
            FileKind::Entrypoint => "entrypoint",
            FileKind::Requirements => "requirements",
            FileKind::Dockerfile => "dockerfile",
            FileKind::Tests => "tests",
        }
    }

    /// Recover the kind of a file from its path relative to the output root.
    pub fn classify(relative_path: &str) -> Result<Self, PlanError> {
        let kind = match relative_path {
            MODELS_PATH => FileKind::Models,
            ENTRYPOINT_PATH => FileKind::Entrypoint,
            REQUIREMENTS_PATH => FileKind::Requirements,
            DOCKERFILE_PATH => FileKind::Dockerfile,
            TESTS_PATH => FileKind::Tests,
            other => {
                let stem = other
                    .strip_prefix(ROUTES_DIR)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .and_then(|name| name.strip_suffix(".py"))
                    .filter(|stem| !stem.is_empty() && !stem.contains('/'))
                    .ok_or_else(|| PlanError::UnknownCategory(other.to_string()))?;
                FileKind::Router(RouterIdent::from_file_stem(stem))
            }
        };
        Ok(kind)
    }
}

/// How to cut the slice of the description a file needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnippetSource {
    /// The full schema mapping.
    Schemas,
    /// Operations owned by `tag`, plus the full schema mapping.
    Router { tag: String, source: TagSource },
    /// Servers and the run's tag set.
    Entrypoint {
        tags: Vec<String>,
        routers: Vec<RouterIdent>,
    },
    Dependencies(Vec<String>),
    /// The whole description.
    Document,
    Empty,
}

impl SnippetSource {
    pub fn extract(&self, spec: &ApiDescription) -> Snippet {
        match self {
            SnippetSource::Schemas => Snippet::Schemas(spec.schemas()),
            SnippetSource::Router { tag, source } => {
                Snippet::Router(router_snippet(spec, tag, *source))
            }
            SnippetSource::Entrypoint { tags, routers } => Snippet::Entrypoint(EntrypointSnippet {
                servers: spec.servers.clone(),
                tags: tags.clone(),
                routers: routers.clone(),
            }),
            SnippetSource::Dependencies(deps) => Snippet::Dependencies(deps.clone()),
            SnippetSource::Document => Snippet::Document(Box::new(spec.clone())),
            SnippetSource::Empty => Snippet::Empty {},
        }
    }
}

fn router_snippet(spec: &ApiDescription, tag: &str, source: TagSource) -> RouterSnippet {
    let paths = spec
        .path_items()
        .filter_map(|(path, item)| {
            let owned: IndexMap<HttpMethod, Operation> = item
                .operations
                .iter()
                .filter(|(_, op)| source.owns(tag, path, op))
                .map(|(method, op)| (*method, op.clone()))
                .collect();
            (!owned.is_empty()).then(|| (path.clone(), owned))
        })
        .collect();

    RouterSnippet {
        paths,
        schemas: spec.schemas(),
    }
}

/// The data bound into one file's prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Snippet {
    Schemas(IndexMap<String, Value>),
    Router(RouterSnippet),
    Entrypoint(EntrypointSnippet),
    Dependencies(Vec<String>),
    Document(Box<ApiDescription>),
    Empty {},
}

impl Snippet {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterSnippet {
    pub paths: IndexMap<String, IndexMap<HttpMethod, Operation>>,
    pub schemas: IndexMap<String, Value>,
}

impl RouterSnippet {
    /// Schemas referenced by the router's request bodies and responses.
    pub fn schema_refs(&self) -> BTreeSet<String> {
        self.paths
            .values()
            .flat_map(|ops| ops.values())
            .flat_map(|op| op.request_schema_refs().into_iter().chain(op.response_schema_refs()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrypointSnippet {
    pub servers: Vec<Server>,
    pub tags: Vec<String>,
    /// Router modules to mount; bound into the prompt but not part of the snippet.
    #[serde(skip)]
    pub routers: Vec<RouterIdent>,
}

/// One file to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub relative_path: String,
    pub display_name: String,
    pub kind: FileKind,
    pub snippet: SnippetSource,
}

impl FileSpec {
    fn new(relative_path: &str, kind: FileKind, snippet: SnippetSource) -> Self {
        let display_name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path)
            .to_string();
        Self {
            relative_path: relative_path.to_string(),
            display_name,
            kind,
            snippet,
        }
    }

    pub fn extract(&self, spec: &ApiDescription) -> Snippet {
        self.snippet.extract(spec)
    }
}

/// The ordered set of files produced for one description.
#[derive(Debug, Clone)]
pub struct FilePlan {
    pub tags: TagSet,
    /// Models, routers in tag order, entrypoint, then manifests.
    pub files: Vec<FileSpec>,
    /// Generated after `files`, outside the repair loop.
    pub test_module: FileSpec,
}

impl FilePlan {
    pub fn routers(&self) -> impl Iterator<Item = &FileSpec> {
        self.files
            .iter()
            .filter(|f| matches!(f.kind, FileKind::Router(_)))
    }

    pub fn get(&self, relative_path: &str) -> Option<&FileSpec> {
        self.files
            .iter()
            .chain(std::iter::once(&self.test_module))
            .find(|f| f.relative_path == relative_path)
    }
}

/// Derive the file plan of a description.
pub fn build_plan(spec: &ApiDescription) -> Result<FilePlan, PlanError> {
    let tags = TagSet::derive(spec);
    let routers = router_idents(&tags)?;

    let mut files = vec![FileSpec::new(
        MODELS_PATH,
        FileKind::Models,
        SnippetSource::Schemas,
    )];

    for ident in &routers {
        files.push(FileSpec::new(
            &format!("{ROUTES_DIR}/{}", ident.file_name()),
            FileKind::Router(ident.clone()),
            SnippetSource::Router {
                tag: ident.tag.clone(),
                source: tags.source,
            },
        ));
    }

    files.push(FileSpec::new(
        ENTRYPOINT_PATH,
        FileKind::Entrypoint,
        SnippetSource::Entrypoint {
            tags: tags.tags.clone(),
            routers,
        },
    ));
    files.push(FileSpec::new(
        REQUIREMENTS_PATH,
        FileKind::Requirements,
        SnippetSource::Dependencies(DEPENDENCIES.iter().map(|d| d.to_string()).collect()),
    ));
    files.push(FileSpec::new(
        DOCKERFILE_PATH,
        FileKind::Dockerfile,
        SnippetSource::Empty,
    ));

    log::debug!(
        "planned {} files for {} {:?} tag(s)",
        files.len(),
        tags.tags.len(),
        tags.source
    );

    Ok(FilePlan {
        tags,
        files,
        test_module: FileSpec::new(TESTS_PATH, FileKind::Tests, SnippetSource::Document),
    })
}

fn router_idents(tags: &TagSet) -> Result<Vec<RouterIdent>, PlanError> {
    if tags.is_synthetic() {
        let mut ident = RouterIdent::from_file_stem(DEFAULT_ROUTER_STEM);
        ident.tag = DEFAULT_TAG.to_string();
        return Ok(vec![ident]);
    }

    let mut seen: HashMap<String, String> = HashMap::new();
    let mut idents = Vec::with_capacity(tags.tags.len());
    for tag in &tags.tags {
        let ident = RouterIdent::from_tag(tag);
        if let Some(first) = seen.insert(ident.module.clone(), tag.clone()) {
            return Err(PlanError::RouterCollision {
                first,
                second: tag.clone(),
                module: ident.module,
            });
        }
        idents.push(ident);
    }
    Ok(idents)
}
