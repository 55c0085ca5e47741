use forge_core::parse::{self, HttpMethod};
use forge_core::plan::{FileKind, Snippet};
use forge_core::{TagSource, build_plan};

const NOTES: &str = include_str!("fixtures/notes.yaml");
const MIXED: &str = include_str!("fixtures/mixed-tags.yaml");
const UNTAGGED: &str = include_str!("fixtures/untagged.yaml");
const BARE: &str = include_str!("fixtures/bare.yaml");
const NO_PATHS: &str = include_str!("fixtures/no-paths.yaml");

fn plan_paths(yaml: &str) -> String {
    let spec = parse::from_yaml(yaml).unwrap();
    let plan = build_plan(&spec).unwrap();
    plan.files
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn notes_plan_order() {
    insta::assert_snapshot!(plan_paths(NOTES), @r"
    app/models.py
    app/routes/notes.py
    app/routes/users.py
    app/main.py
    requirements.txt
    Dockerfile
    ");
}

#[test]
fn notes_router_snippets_are_filtered_by_tag() {
    let spec = parse::from_yaml(NOTES).unwrap();
    let plan = build_plan(&spec).unwrap();
    assert_eq!(plan.tags.tags, vec!["Notes", "Users"]);

    let notes = plan.get("app/routes/notes.py").unwrap();
    match notes.extract(&spec) {
        Snippet::Router(router) => {
            assert_eq!(router.paths.keys().collect::<Vec<_>>(), vec!["/api/notes"]);
            let methods: Vec<_> = router.paths["/api/notes"].keys().copied().collect();
            assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Post]);
            // Routers see every schema, not only the ones they reference.
            assert_eq!(router.schemas.len(), 3);
        }
        other => panic!("expected router snippet, got {other:?}"),
    }

    let users = plan.get("app/routes/users.py").unwrap();
    match users.extract(&spec) {
        Snippet::Router(router) => {
            assert_eq!(router.paths.keys().collect::<Vec<_>>(), vec!["/api/users"]);
            assert_eq!(router.paths["/api/users"].len(), 1);
            assert!(router.paths["/api/users"].contains_key(&HttpMethod::Get));
        }
        other => panic!("expected router snippet, got {other:?}"),
    }
}

#[test]
fn entrypoint_snippet_reuses_the_tag_set() {
    let spec = parse::from_yaml(NOTES).unwrap();
    let plan = build_plan(&spec).unwrap();
    let main = plan.get("app/main.py").unwrap();

    match main.extract(&spec) {
        Snippet::Entrypoint(entry) => {
            assert_eq!(entry.tags, plan.tags.tags);
            assert_eq!(entry.servers.len(), 1);
            let modules: Vec<_> = entry.routers.iter().map(|r| r.module.as_str()).collect();
            assert_eq!(modules, vec!["notes", "users"]);
        }
        other => panic!("expected entrypoint snippet, got {other:?}"),
    }

    let json: serde_json::Value =
        serde_json::from_str(&main.extract(&spec).to_json().unwrap()).unwrap();
    assert_eq!(json["tags"], serde_json::json!(["Notes", "Users"]));
    assert!(json.get("routers").is_none());
}

#[test]
fn mixed_tags_split_one_path_across_routers() {
    let spec = parse::from_yaml(MIXED).unwrap();
    let plan = build_plan(&spec).unwrap();
    assert_eq!(plan.tags.tags, vec!["Admin", "Items"]);

    let Snippet::Router(items) = plan.get("app/routes/items.py").unwrap().extract(&spec) else {
        panic!("expected router snippet");
    };
    let methods: Vec<_> = items.paths["/api/items/{id}"].keys().copied().collect();
    assert_eq!(methods, vec![HttpMethod::Get]);
    assert!(!items.paths.contains_key("/api/reports"));

    let Snippet::Router(admin) = plan.get("app/routes/admin.py").unwrap().extract(&spec) else {
        panic!("expected router snippet");
    };
    let methods: Vec<_> = admin.paths["/api/items/{id}"].keys().copied().collect();
    assert_eq!(methods, vec![HttpMethod::Delete]);
    assert!(admin.paths.contains_key("/api/reports"));

    // Non-method keys never reach a router snippet.
    let json = serde_json::to_value(&admin).unwrap();
    assert!(json["paths"]["/api/items/{id}"].get("parameters").is_none());
    assert!(json["paths"]["/api/items/{id}"].get("trace").is_none());
}

#[test]
fn untagged_plan_uses_api_resources() {
    let spec = parse::from_yaml(UNTAGGED).unwrap();
    let plan = build_plan(&spec).unwrap();
    assert_eq!(plan.tags.source, TagSource::PathSegment);
    assert_eq!(plan.tags.tags, vec!["authors", "books"]);

    insta::assert_snapshot!(plan_paths(UNTAGGED), @r"
    app/models.py
    app/routes/authors.py
    app/routes/books.py
    app/main.py
    requirements.txt
    Dockerfile
    ");

    let Snippet::Router(books) = plan.get("app/routes/books.py").unwrap().extract(&spec) else {
        panic!("expected router snippet");
    };
    assert_eq!(
        books.paths.keys().collect::<Vec<_>>(),
        vec!["/api/books", "/api/books/{id}"]
    );
}

#[test]
fn bare_plan_has_single_default_router() {
    let spec = parse::from_yaml(BARE).unwrap();
    let plan = build_plan(&spec).unwrap();
    assert_eq!(plan.tags.source, TagSource::Synthetic);
    assert_eq!(plan.tags.tags, vec!["default"]);

    let routers: Vec<_> = plan.routers().collect();
    assert_eq!(routers.len(), 1);
    assert_eq!(routers[0].relative_path, "app/routes/routes.py");

    let Snippet::Router(all) = routers[0].extract(&spec) else {
        panic!("expected router snippet");
    };
    assert_eq!(all.paths.keys().collect::<Vec<_>>(), vec!["/health", "/version"]);
}

#[test]
fn missing_paths_is_not_an_error() {
    let spec = parse::from_yaml(NO_PATHS).unwrap();
    let plan = build_plan(&spec).unwrap();

    let kinds: Vec<_> = plan.files.iter().map(|f| f.kind.category()).collect();
    assert_eq!(
        kinds,
        vec!["models", "router", "entrypoint", "requirements", "dockerfile"]
    );
    assert_eq!(plan.files[0].extract(&spec).to_json().unwrap(), "{}");
    assert_eq!(plan.files[4].extract(&spec).to_json().unwrap(), "{}");
}

#[test]
fn relative_paths_are_unique_and_classify_back() {
    for yaml in [NOTES, MIXED, UNTAGGED, BARE, NO_PATHS] {
        let spec = parse::from_yaml(yaml).unwrap();
        let plan = build_plan(&spec).unwrap();

        let mut seen = std::collections::HashSet::new();
        for file in plan.files.iter().chain(std::iter::once(&plan.test_module)) {
            assert!(seen.insert(file.relative_path.clone()), "duplicate {}", file.relative_path);
            let kind = FileKind::classify(&file.relative_path).unwrap();
            match (&kind, &file.kind) {
                (FileKind::Router(a), FileKind::Router(b)) => {
                    assert_eq!(a.module, b.module);
                    assert_eq!(a.type_name, b.type_name);
                }
                _ => assert_eq!(&kind, &file.kind),
            }
        }
    }
}

#[test]
fn requirements_snippet_lists_dependencies() {
    let spec = parse::from_yaml(NOTES).unwrap();
    let plan = build_plan(&spec).unwrap();
    let Snippet::Dependencies(deps) = plan.get("requirements.txt").unwrap().extract(&spec) else {
        panic!("expected dependency snippet");
    };
    assert_eq!(deps, vec!["fastapi", "uvicorn", "pydantic"]);
}

#[test]
fn router_schema_refs_cover_requests_and_responses() {
    let spec = parse::from_yaml(NOTES).unwrap();
    let plan = build_plan(&spec).unwrap();

    let refs = |path: &str| match plan.get(path).unwrap().extract(&spec) {
        Snippet::Router(router) => router.schema_refs().into_iter().collect::<Vec<_>>(),
        other => panic!("expected router snippet, got {other:?}"),
    };
    assert_eq!(refs("app/routes/notes.py"), vec!["Note", "NoteCreate"]);
    assert_eq!(refs("app/routes/users.py"), vec!["User"]);
}
