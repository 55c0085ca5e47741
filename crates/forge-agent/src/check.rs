use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use forge_core::config::CheckSettings;
use serde::Serialize;

use crate::error::CheckError;

/// Checker output keyed by category, e.g. `lint`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics(BTreeMap<String, String>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: impl Into<String>, text: impl Into<String>) {
        self.0.insert(category.into(), text.into());
    }

    /// No categories, or only blank ones.
    pub fn is_clean(&self) -> bool {
        self.0.values().all(|text| text.trim().is_empty())
    }

    /// Text bound into refinement prompts. Blank categories are omitted.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(category, text)| format!("[{category}]\n{}", text.trim_end()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Runs static checks over a generated output tree.
pub trait CheckCollaborator {
    fn check(&self, root: &Path) -> Result<Diagnostics, CheckError>;
}

/// Runs an external command against `<root>/<target>` and reports its combined
/// output under one category.
#[derive(Debug, Clone)]
pub struct CommandChecker {
    settings: CheckSettings,
}

impl CommandChecker {
    pub fn new(settings: CheckSettings) -> Self {
        Self { settings }
    }
}

impl CheckCollaborator for CommandChecker {
    fn check(&self, root: &Path) -> Result<Diagnostics, CheckError> {
        let (program, args) = self
            .settings
            .command
            .split_first()
            .ok_or(CheckError::EmptyCommand)?;
        let target = root.join(&self.settings.target);

        let output = Command::new(program)
            .args(args)
            .arg(&target)
            .output()
            .map_err(|source| CheckError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Exit status is not consulted; any output is a finding.
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        let mut diagnostics = Diagnostics::new();
        if !text.trim().is_empty() {
            log::info!(
                "{program} reported {} line(s) for {}",
                text.lines().count(),
                target.display()
            );
            diagnostics.insert(self.settings.category.as_str(), text);
        }
        Ok(diagnostics)
    }
}
