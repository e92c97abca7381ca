use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskloomError};

/// Top-level taskloom configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub curator: CuratorConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on act/evaluate iterations per node.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Overrides every tool's own timeout when set.
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
    /// System text used for nodes that carry no profile.
    #[serde(default = "default_profile")]
    pub default_profile: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tool_timeout_secs: None,
            default_profile: default_profile(),
        }
    }
}

fn default_max_iterations() -> usize { 10 }
fn default_profile() -> String { "You are a helpful assistant.".to_string() }

/// How a node's input modalities are checked against its predecessors' outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalityRule {
    /// Union of predecessor outputs must be a subset of the node's inputs.
    Subset,
    /// The node's inputs must be a subset of the union of predecessor outputs.
    #[default]
    Covering,
    /// Union of predecessor outputs must equal the node's inputs.
    Exact,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Model key bound to nodes that request none.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Tools bound to nodes that request none.
    #[serde(default)]
    pub default_tools: Vec<String>,
    #[serde(default)]
    pub modality_rule: ModalityRule,
}

/// Flow memory backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    InMemory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Database path for the sqlite backend.
    #[serde(default = "default_memory_path")]
    pub path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_memory_path(),
        }
    }
}

fn default_memory_path() -> String { "~/.taskloom/flow.db".to_string() }

impl MemoryConfig {
    /// Resolve the database path (expand ~).
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.path)
    }
}

/// Which execution strategy the engine uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Sequential,
    /// Fix the order once from the curated graph and run it as a chain.
    Chain,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
}

/// Retry policy for structured graph generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Model key used to generate graphs.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 200 }
fn default_max_backoff() -> u64 { 5000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String { "taskloom=info,warn".to_string() }

impl AppConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| TaskloomError::ConfigNotFound(path.display().to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML text, expanding `${ENV_VAR}` references.
    pub fn from_toml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self =
            toml::from_str(&expanded).map_err(|e| TaskloomError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(TaskloomError::Config(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.planner.max_attempts == 0 {
            return Err(TaskloomError::Config(
                "planner.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.tool_timeout_secs, None);
        assert_eq!(config.curator.modality_rule, ModalityRule::Covering);
        assert_eq!(config.memory.backend, StorageBackend::InMemory);
        assert_eq!(config.executor.strategy, StrategyKind::Sequential);
        assert_eq!(config.planner.max_attempts, 3);
        assert_eq!(config.log.filter, "taskloom=info,warn");
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let err = AppConfig::from_toml("[agent]\nmax_iterations = 0\n").unwrap_err();
        assert!(matches!(err, TaskloomError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_enum_value() {
        let err = AppConfig::from_toml("[curator]\nmodality_rule = \"loose\"\n").unwrap_err();
        assert!(matches!(err, TaskloomError::Config(_)));
    }

    #[test]
    fn test_expand_env_vars_keeps_unset() {
        let out = expand_env_vars("path = \"${TASKLOOM_SURELY_UNSET_VAR}\"");
        assert_eq!(out, "path = \"${TASKLOOM_SURELY_UNSET_VAR}\"");
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/flow.db"), PathBuf::from("/abs/flow.db"));
    }
}
