//! Bounded check-and-refine loop.
//!
//! A file moves `Generated → Evaluating`, then either to `Accepted` when the
//! checker is clean, to `Refining → Evaluating` while attempts remain, or to
//! `Exhausted` once `max_attempts` refinements have been spent. Exhaustion is
//! not an error: the last content stays on disk and the last diagnostics are
//! kept in the report. A failure after at least one refinement is returned
//! as [`AgentError::RepairInterrupted`] carrying the attempts made so far.

use forge_fastapi::PromptAssembler;

use crate::check::CheckCollaborator;
use crate::client::{GenerationClient, GenerationOptions, Message};
use crate::error::AgentError;
use crate::output;
use crate::repair::{RefineState, RepairAttempt, RepairReport, RepairStrategy, RepairTarget};

pub struct BoundedRefiner<'a> {
    assembler: &'a PromptAssembler,
    client: &'a dyn GenerationClient,
    checker: &'a dyn CheckCollaborator,
    options: GenerationOptions,
    max_attempts: u32,
}

impl<'a> BoundedRefiner<'a> {
    pub fn new(
        assembler: &'a PromptAssembler,
        client: &'a dyn GenerationClient,
        checker: &'a dyn CheckCollaborator,
        options: GenerationOptions,
        max_attempts: u32,
    ) -> Self {
        Self {
            assembler,
            client,
            checker,
            options,
            max_attempts,
        }
    }
}

impl RepairStrategy for BoundedRefiner<'_> {
    fn repair(&self, target: &RepairTarget<'_>) -> Result<RepairReport, AgentError> {
        let mut attempts = Vec::new();
        match self.refine_loop(target, &mut attempts) {
            Err(source) if !attempts.is_empty() => Err(AgentError::RepairInterrupted {
                path: target.relative_path.to_string(),
                attempts,
                source: Box::new(source),
            }),
            result => result,
        }
    }
}

impl BoundedRefiner<'_> {
    fn refine_loop(
        &self,
        target: &RepairTarget<'_>,
        attempts: &mut Vec<RepairAttempt>,
    ) -> Result<RepairReport, AgentError> {
        let path = target.path();
        let mut transitions = vec![RefineState::Generated];

        loop {
            transitions.push(RefineState::Evaluating);
            let diagnostics = self.checker.check(target.root)?;

            if diagnostics.is_clean() {
                transitions.push(RefineState::Accepted);
                log::info!(
                    "{} accepted after {} refinement(s)",
                    target.relative_path,
                    attempts.len()
                );
                return Ok(RepairReport {
                    terminal: RefineState::Accepted,
                    transitions,
                    attempts: std::mem::take(attempts),
                    final_diagnostics: None,
                });
            }

            let rendered = diagnostics.render();
            let attempt = attempts.len() as u32 + 1;
            if attempt > self.max_attempts {
                transitions.push(RefineState::Exhausted);
                log::warn!(
                    "{} still has diagnostics after {} refinement(s); keeping last version",
                    target.relative_path,
                    self.max_attempts
                );
                return Ok(RepairReport {
                    terminal: RefineState::Exhausted,
                    transitions,
                    attempts: std::mem::take(attempts),
                    final_diagnostics: Some(rendered),
                });
            }

            transitions.push(RefineState::Refining);
            let code = output::read_text(&path)?;
            let request =
                self.assembler
                    .refine(target.relative_path, &code, &rendered, target.snippet)?;
            log::info!(
                "refining {} (attempt {attempt}/{})",
                target.relative_path,
                self.max_attempts
            );
            let response = self
                .client
                .complete(&Message::for_request(&request), &self.options)?;
            output::write_text(&path, &response)?;

            attempts.push(RepairAttempt {
                attempt,
                prompt: request.user,
                changed: response.trim() != code.trim(),
                response,
                diagnostics: rendered,
            });
        }
    }
}
