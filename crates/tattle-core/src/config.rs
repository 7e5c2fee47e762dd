use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::form::SuccessPolicy;
use crate::store::{FEEDBACK_DIR, FeedbackStore, HttpStore, JsonlStore};
use crate::validate::{DEFAULT_SCHEMES, MAX_DESCRIPTION_LEN, MAX_STEPS_LEN, StandardRules};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormConfig {
    #[serde(default)]
    pub on_success: SuccessPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Jsonl,
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_schemes")]
    pub allowed_schemes: Vec<String>,
    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,
    #[serde(default = "default_max_steps_len")]
    pub max_steps_len: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: default_schemes(),
            max_description_len: default_max_description_len(),
            max_steps_len: default_max_steps_len(),
        }
    }
}

impl From<&RulesConfig> for StandardRules {
    fn from(cfg: &RulesConfig) -> Self {
        Self {
            allowed_schemes: cfg.allowed_schemes.clone(),
            max_description_len: cfg.max_description_len,
            max_steps_len: cfg.max_steps_len,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

impl ProjectConfig {
    /// Build the persistence backend this config selects.
    pub fn build_store(&self, project_root: &Path) -> Result<Arc<dyn FeedbackStore>> {
        match self.store.backend {
            StoreBackend::Jsonl => Ok(Arc::new(JsonlStore::new(project_root))),
            StoreBackend::Http => {
                let Some(endpoint) = self.store.endpoint.as_deref() else {
                    bail!("[store] backend = \"http\" requires an endpoint");
                };
                Ok(Arc::new(HttpStore::new(
                    endpoint,
                    Duration::from_secs(self.store.timeout_secs),
                )))
            }
        }
    }
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(FEEDBACK_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("tattle/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Walk up from `start` looking for a `.tattle` directory.
///
/// Falls back to `start` itself so a first submission creates the directory
/// where the user is standing.
#[must_use]
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(FEEDBACK_DIR).is_dir() {
            return current;
        }
        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_timeout_secs() -> u64 {
    10
}

fn default_schemes() -> Vec<String> {
    DEFAULT_SCHEMES.iter().map(ToString::to_string).collect()
}

const fn default_max_description_len() -> usize {
    MAX_DESCRIPTION_LEN
}

const fn default_max_steps_len() -> usize {
    MAX_STEPS_LEN
}
