//! Refinement of an existing output tree from an external test log.
//!
//! Every router file gets exactly one request, whatever the log says. A file
//! is rewritten only when the trimmed response differs from its trimmed
//! content, and each request is logged to `refiner_log.json`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use forge_core::plan::ROUTES_DIR;
use forge_fastapi::PromptAssembler;
use serde::{Deserialize, Serialize};

use crate::client::{GenerationClient, GenerationOptions, Message};
use crate::error::AgentError;
use crate::output;
use crate::repair::{RefineState, RepairAttempt, RepairReport, RepairStrategy, RepairTarget};

pub const REFINER_LOG_FILE: &str = "refiner_log.json";

/// Single unconditional router repair driven by a test log.
///
/// The target snippet is expected to be the whole serialized description.
pub struct BlanketRefiner<'a> {
    assembler: &'a PromptAssembler,
    client: &'a dyn GenerationClient,
    options: GenerationOptions,
    errors: &'a str,
}

impl<'a> BlanketRefiner<'a> {
    pub fn new(
        assembler: &'a PromptAssembler,
        client: &'a dyn GenerationClient,
        options: GenerationOptions,
        errors: &'a str,
    ) -> Self {
        Self {
            assembler,
            client,
            options,
            errors,
        }
    }
}

impl RepairStrategy for BlanketRefiner<'_> {
    fn repair(&self, target: &RepairTarget<'_>) -> Result<RepairReport, AgentError> {
        let path = target.path();
        let code = output::read_text(&path)?;
        let request =
            self.assembler
                .refine_router(target.relative_path, &code, self.errors, target.snippet)?;

        log::info!("refining router {} against test log", target.relative_path);
        let response = self
            .client
            .complete(&Message::for_request(&request), &self.options)?;

        let changed = response.trim() != code.trim();
        if changed {
            output::write_text(&path, &response)?;
            log::info!("updated {}", target.relative_path);
        } else {
            log::info!("no changes needed for {}", target.relative_path);
        }

        Ok(RepairReport {
            terminal: RefineState::Accepted,
            transitions: vec![
                RefineState::Generated,
                RefineState::Refining,
                RefineState::Accepted,
            ],
            attempts: vec![RepairAttempt {
                attempt: 1,
                prompt: request.user,
                response,
                diagnostics: self.errors.to_string(),
                changed,
            }],
            final_diagnostics: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementLogEntry {
    pub filename: String,
    pub changed: bool,
    pub prompt: String,
    pub response: String,
    pub errors: String,
    pub timestamp: DateTime<Utc>,
}

/// Applies a repair strategy to every router of an existing output tree.
pub struct StandaloneRefiner<'a> {
    strategy: &'a dyn RepairStrategy,
}

impl<'a> StandaloneRefiner<'a> {
    pub fn new(strategy: &'a dyn RepairStrategy) -> Self {
        Self { strategy }
    }

    /// Refine `<app_dir>/app/routes/*.py` in file-name order.
    ///
    /// A missing routes directory is logged and yields no entries and no log file.
    /// If a request fails, the entries collected so far are written to
    /// `refiner_log.json` before the error is returned.
    pub fn run(&self, app_dir: &Path, spec_json: &str) -> Result<Vec<RefinementLogEntry>, AgentError> {
        let routes_dir = app_dir.join(ROUTES_DIR);
        if !routes_dir.is_dir() {
            log::warn!(
                "no routes directory at {}, skipping refinement",
                routes_dir.display()
            );
            return Ok(Vec::new());
        }

        let log_path = app_dir.join(REFINER_LOG_FILE);
        let mut entries = Vec::new();
        for name in router_files(&routes_dir)? {
            let relative_path = format!("{ROUTES_DIR}/{name}");
            let outcome = self.strategy.repair(&RepairTarget {
                root: app_dir,
                relative_path: &relative_path,
                snippet: spec_json,
            });
            let report = match outcome {
                Ok(report) => report,
                Err(err) => {
                    if let Err(write_err) = output::write_json(&log_path, &entries) {
                        log::warn!("could not write partial refinement log: {write_err}");
                    }
                    return Err(err);
                }
            };

            let Some(attempt) = report.attempts.into_iter().last() else {
                log::debug!("{relative_path}: strategy made no request");
                continue;
            };
            entries.push(RefinementLogEntry {
                filename: relative_path,
                changed: attempt.changed,
                prompt: attempt.prompt,
                response: attempt.response,
                errors: attempt.diagnostics,
                timestamp: Utc::now(),
            });
        }

        output::write_json(&log_path, &entries)?;
        log::info!(
            "wrote {} refinement entries to {}",
            entries.len(),
            log_path.display()
        );
        Ok(entries)
    }
}

/// Sorted names of the `.py` files directly inside `dir`.
fn router_files(dir: &Path) -> Result<Vec<String>, AgentError> {
    let io_err = |source: std::io::Error| AgentError::Io {
        action: "list",
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path: PathBuf = entry.map_err(io_err)?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "py") {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use forge_core::config::GenerationSettings;

    use super::*;
    use crate::error::ClientError;

    /// Echoes the router file back, except for files named in `rewrite`.
    struct Rewriter {
        rewrite: Vec<(&'static str, &'static str)>,
        prompts: RefCell<Vec<String>>,
    }

    impl GenerationClient for Rewriter {
        fn complete(
            &self,
            messages: &[Message],
            _options: &GenerationOptions,
        ) -> Result<String, ClientError> {
            let prompt = messages[1].content.clone();
            self.prompts.borrow_mut().push(prompt.clone());
            for (marker, replacement) in &self.rewrite {
                if prompt.contains(marker) {
                    return Ok(replacement.to_string());
                }
            }
            // Reply with the current code plus surrounding whitespace.
            let code = prompt
                .split("This is the full router file")
                .nth(1)
                .and_then(|rest| rest.split_once(":\n"))
                .and_then(|(_, rest)| rest.split("\n\nThis is the OpenAPI document").next())
                .unwrap_or_default();
            Ok(format!("\n{code}\n\n"))
        }
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        output::write_file(dir.path(), "app/routes/users.py", "users = 1\n").unwrap();
        output::write_file(dir.path(), "app/routes/notes.py", "notes = 1\n").unwrap();
        output::write_file(dir.path(), "app/routes/README.md", "not python").unwrap();
        dir
    }

    #[test]
    fn test_refines_routers_in_name_order() {
        let dir = tree();
        let client = Rewriter {
            rewrite: vec![("\"Users\" router", "users = 2\n")],
            prompts: RefCell::default(),
        };
        let assembler = PromptAssembler::new().unwrap();
        let blanket = BlanketRefiner::new(
            &assembler,
            &client,
            GenerationOptions::from(&GenerationSettings::default()),
            "FAILED test_get_users",
        );

        let entries = StandaloneRefiner::new(&blanket)
            .run(dir.path(), "{\"paths\": {}}")
            .unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["app/routes/notes.py", "app/routes/users.py"]);
        assert!(!entries[0].changed);
        assert!(entries[1].changed);
        assert_eq!(entries[1].errors, "FAILED test_get_users");

        let notes = fs::read_to_string(dir.path().join("app/routes/notes.py")).unwrap();
        let users = fs::read_to_string(dir.path().join("app/routes/users.py")).unwrap();
        assert_eq!(notes, "notes = 1\n", "unchanged file must stay byte-identical");
        assert_eq!(users, "users = 2\n");

        let prompts = client.prompts.borrow();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|p| p.contains("FAILED test_get_users")));
        assert!(prompts.iter().all(|p| p.contains("{\"paths\": {}}")));

        let logged: Vec<RefinementLogEntry> = serde_json::from_str(
            &fs::read_to_string(dir.path().join(REFINER_LOG_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(logged, entries);
    }

    /// Rewrites the notes router and fails for every other file.
    struct NotesOnly;

    impl GenerationClient for NotesOnly {
        fn complete(
            &self,
            messages: &[Message],
            _options: &GenerationOptions,
        ) -> Result<String, ClientError> {
            if messages[1].content.contains("\"Notes\" router") {
                Ok("notes = 2\n".to_string())
            } else {
                Err(ClientError::EmptyResponse)
            }
        }
    }

    #[test]
    fn test_failure_writes_partial_log() {
        let dir = tree();
        let assembler = PromptAssembler::new().unwrap();
        let blanket = BlanketRefiner::new(
            &assembler,
            &NotesOnly,
            GenerationOptions::from(&GenerationSettings::default()),
            "FAILED test_get_users",
        );

        let err = StandaloneRefiner::new(&blanket)
            .run(dir.path(), "{}")
            .unwrap_err();
        assert!(matches!(err, AgentError::Client(ClientError::EmptyResponse)));

        let notes = fs::read_to_string(dir.path().join("app/routes/notes.py")).unwrap();
        assert_eq!(notes, "notes = 2\n");
        let logged: Vec<RefinementLogEntry> = serde_json::from_str(
            &fs::read_to_string(dir.path().join(REFINER_LOG_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].filename, "app/routes/notes.py");
        assert!(logged[0].changed);
    }

    #[test]
    fn test_blanket_report_skips_evaluation() {
        let dir = tree();
        let assembler = PromptAssembler::new().unwrap();
        let blanket = BlanketRefiner::new(
            &assembler,
            &NotesOnly,
            GenerationOptions::from(&GenerationSettings::default()),
            "log",
        );

        let report = blanket
            .repair(&RepairTarget {
                root: dir.path(),
                relative_path: "app/routes/notes.py",
                snippet: "{}",
            })
            .unwrap();
        assert_eq!(report.terminal, RefineState::Accepted);
        assert_eq!(
            report.transitions,
            vec![
                RefineState::Generated,
                RefineState::Refining,
                RefineState::Accepted
            ]
        );
        assert!(!report.transitions.contains(&RefineState::Evaluating));
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].diagnostics, "log");
    }

    #[test]
    fn test_missing_routes_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let client = Rewriter {
            rewrite: vec![],
            prompts: RefCell::default(),
        };
        let assembler = PromptAssembler::new().unwrap();
        let blanket = BlanketRefiner::new(
            &assembler,
            &client,
            GenerationOptions::from(&GenerationSettings::default()),
            "log",
        );

        let entries = StandaloneRefiner::new(&blanket).run(dir.path(), "{}").unwrap();
        assert!(entries.is_empty());
        assert!(client.prompts.borrow().is_empty());
        assert!(!dir.path().join(REFINER_LOG_FILE).exists());
    }

    #[test]
    fn test_empty_routes_directory_writes_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(ROUTES_DIR)).unwrap();
        let client = Rewriter {
            rewrite: vec![],
            prompts: RefCell::default(),
        };
        let assembler = PromptAssembler::new().unwrap();
        let blanket = BlanketRefiner::new(
            &assembler,
            &client,
            GenerationOptions::from(&GenerationSettings::default()),
            "log",
        );

        let entries = StandaloneRefiner::new(&blanket).run(dir.path(), "{}").unwrap();
        assert!(entries.is_empty());
        let logged = fs::read_to_string(dir.path().join(REFINER_LOG_FILE)).unwrap();
        assert_eq!(logged.trim(), "[]");
    }
}
