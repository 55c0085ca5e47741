use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration, loaded from `.forge.yaml` and overlaid with the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub output: String,
    pub generation: GenerationSettings,
    pub refine: RefineSettings,
    pub check: CheckSettings,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            output: "generated_app".to_string(),
            generation: GenerationSettings::default(),
            refine: RefineSettings::default(),
            check: CheckSettings::default(),
        }
    }
}

/// Text-generation backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Bearer credential. Usually supplied through `OPENAI_API_KEY` only.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request timeout; `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout_secs: Some(300),
        }
    }
}

/// Bounds of the check-and-refine loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineSettings {
    pub max_attempts: u32,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

/// External checker invocation. The output subdirectory is appended as the last argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    pub command: Vec<String>,
    pub target: String,
    /// Diagnostic category reported for non-empty checker output.
    pub category: String,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            command: vec!["flake8".to_string()],
            target: "app".to_string(),
            category: "lint".to_string(),
        }
    }
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".forge.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<ForgeConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ForgeConfig =
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(config))
}

impl ForgeConfig {
    /// Overlay values from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; unset or blank variables keep the current value.
    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.generation.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.generation.base_url = url;
        }
        if let Some(model) = get("MODEL_NAME") {
            self.generation.model = model;
        }
        if let Some(v) = get("MAX_TOKENS") {
            self.generation.max_tokens = parse_env("MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("TEMPERATURE") {
            self.generation.temperature = parse_env("TEMPERATURE", &v)?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", &v)?;
            self.generation.timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = get("MAX_REFINE_ATTEMPTS") {
            self.refine.max_attempts = parse_env("MAX_REFINE_ATTEMPTS", &v)?;
        }
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# forge configuration
output: generated_app

generation:
  # api_key is read from OPENAI_API_KEY
  base_url: https://api.openai.com/v1
  model: gpt-4o
  max_tokens: 4096
  temperature: 0.2
  timeout_secs: 300

refine:
  max_attempts: 2       # refinement requests per file before giving up

check:
  command: [flake8]     # the target directory is appended
  target: app
  category: lint
"#
}
