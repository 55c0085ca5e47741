use std::path::{Path, PathBuf};

use forge_core::parse::ApiDescription;
use forge_core::plan::{FilePlan, FileSpec, build_plan};
use forge_fastapi::{PromptAssembler, STACK};

use crate::client::{GenerationClient, GenerationOptions, Message};
use crate::error::AgentError;
use crate::metadata::{GenerationEntry, MetadataRecorder};
use crate::output;
use crate::repair::{RefineState, RepairStrategy, RepairTarget};

/// Result of a completed generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub metadata_path: PathBuf,
    /// Relative paths in the order they were written.
    pub files: Vec<String>,
    /// Files that kept diagnostics after the repair loop.
    pub exhausted: Vec<String>,
}

/// Drives plan → prompt → generate → write → repair for every planned file,
/// then generates the test module and persists metadata.
pub struct Generator<'a> {
    assembler: &'a PromptAssembler,
    client: &'a dyn GenerationClient,
    strategy: &'a dyn RepairStrategy,
    options: GenerationOptions,
}

impl<'a> Generator<'a> {
    pub fn new(
        assembler: &'a PromptAssembler,
        client: &'a dyn GenerationClient,
        strategy: &'a dyn RepairStrategy,
        options: GenerationOptions,
    ) -> Self {
        Self {
            assembler,
            client,
            strategy,
            options,
        }
    }

    /// Generate the service for `spec` under `output`.
    ///
    /// If a collaborator fails midway, the entries recorded so far are written
    /// to `metadata.json` before the error is returned. A file whose repair
    /// failed keeps its entry with no terminal state.
    pub fn run(&self, spec: &ApiDescription, output: &Path) -> Result<GenerationSummary, AgentError> {
        let plan = build_plan(spec)?;
        let mut recorder = MetadataRecorder::new(STACK);

        match self.generate_all(spec, &plan, output, &mut recorder) {
            Ok(exhausted) => {
                let metadata_path = recorder.persist(output)?;
                Ok(GenerationSummary {
                    metadata_path,
                    files: recorder
                        .metadata()
                        .files
                        .iter()
                        .map(|entry| entry.filename.clone())
                        .collect(),
                    exhausted,
                })
            }
            Err(err) => {
                if let Err(persist_err) = recorder.persist(output) {
                    log::warn!("could not persist partial metadata: {persist_err}");
                }
                Err(err)
            }
        }
    }

    fn generate_all(
        &self,
        spec: &ApiDescription,
        plan: &FilePlan,
        output: &Path,
        recorder: &mut MetadataRecorder,
    ) -> Result<Vec<String>, AgentError> {
        let mut exhausted = Vec::new();

        for file in &plan.files {
            let (mut entry, snippet) = self.generate_file(spec, file, output)?;
            let outcome = self.strategy.repair(&RepairTarget {
                root: output,
                relative_path: &file.relative_path,
                snippet: &snippet,
            });
            match outcome {
                Ok(report) => {
                    if report.terminal == RefineState::Exhausted {
                        exhausted.push(file.relative_path.clone());
                    }
                    entry.apply(report);
                    recorder.record(entry);
                }
                Err(err) => {
                    // The file is already on disk, so its entry is kept.
                    if let AgentError::RepairInterrupted { attempts, .. } = &err {
                        entry.refinements = attempts.clone();
                    }
                    recorder.record(entry);
                    return Err(err);
                }
            }
        }

        let (entry, _) = self.generate_file(spec, &plan.test_module, output)?;
        recorder.record(entry);

        Ok(exhausted)
    }

    /// Assemble, request and write one file. Returns its entry and serialized snippet.
    fn generate_file(
        &self,
        spec: &ApiDescription,
        file: &FileSpec,
        output: &Path,
    ) -> Result<(GenerationEntry, String), AgentError> {
        let snippet = file.extract(spec);
        let request = self.assembler.assemble(file, &snippet)?;
        log::info!(
            "generating {} ({} chars of prompt)",
            file.relative_path,
            request.user.len()
        );

        let response = self
            .client
            .complete(&Message::for_request(&request), &self.options)?;
        output::write_file(output, &file.relative_path, &response)?;
        log::info!("wrote {}", file.relative_path);

        let snippet_json = snippet.to_json().map_err(|source| AgentError::Json {
            path: PathBuf::from(&file.relative_path),
            source,
        })?;
        Ok((
            GenerationEntry::new(&file.relative_path, request.user, response),
            snippet_json,
        ))
    }
}
