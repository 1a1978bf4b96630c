//! Configuration loading, validation, and management for SwarmForge.
//!
//! Loads configuration from `~/.swarmforge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use swarmforge_core::agent::{Agent, SpecialistCategory};

/// The root configuration structure.
///
/// Maps directly to `~/.swarmforge/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Providers to try, in order, when a request doesn't specify one
    #[serde(default = "default_provider_order")]
    pub provider_order: Vec<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Per-user admission control
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Orchestrator limits
    #[serde(default)]
    pub swarm: SwarmConfig,

    /// Critique→refine loop defaults
    #[serde(default)]
    pub convergence: ConvergenceConfig,

    /// Specialist report weighting
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Latency metrics
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Custom agent catalog; empty = built-in presets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<Agent>,
}

fn default_provider_order() -> Vec<String> {
    vec!["openrouter".into(), "openai".into(), "anthropic".into()]
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Set to enable embeddings through this provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_timeout() -> u64 {
    120
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("embedding_model", &self.embedding_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "in_memory" or "file"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Character limit of the injected memory block
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Store each completed run's output as a new memory
    #[serde(default = "default_true")]
    pub auto_save: bool,
}

fn default_memory_backend() -> String {
    "file".into()
}
fn default_top_k() -> usize {
    5
}
fn default_embedding_dimension() -> usize {
    1536
}
fn default_max_context_chars() -> usize {
    4000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            top_k: default_top_k(),
            embedding_dimension: default_embedding_dimension(),
            max_context_chars: default_max_context_chars(),
            auto_save: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    #[serde(default = "default_refill_per_second")]
    pub refill_per_second: f64,
}

fn default_capacity() -> u32 {
    20
}
fn default_refill_per_second() -> f64 {
    // 20 requests per minute sustained
    1.0 / 3.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_second: default_refill_per_second(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    #[serde(default = "default_max_task_chars")]
    pub max_task_chars: usize,

    #[serde(default = "default_max_file_context_chars")]
    pub max_file_context_chars: usize,

    /// Per-specialist timeout in fan-out reviews
    #[serde(default = "default_specialist_timeout")]
    pub specialist_timeout_secs: u64,
}

fn default_max_task_chars() -> usize {
    20_000
}
fn default_max_file_context_chars() -> usize {
    200_000
}
fn default_specialist_timeout() -> u64 {
    90
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_task_chars: default_max_task_chars(),
            max_file_context_chars: default_max_file_context_chars(),
            specialist_timeout_secs: default_specialist_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Score (0–100) at which an artifact is approved
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Below this final score the gate rejects instead of asking for revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_floor: Option<f64>,
}

fn default_threshold() -> f64 {
    80.0
}
fn default_max_iterations() -> u32 {
    3
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_iterations: default_max_iterations(),
            hard_floor: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_weights")]
    pub weights: HashMap<SpecialistCategory, f64>,
}

/// Published default weights for the overall review score.
pub fn default_weights() -> HashMap<SpecialistCategory, f64> {
    HashMap::from([
        (SpecialistCategory::Security, 0.35),
        (SpecialistCategory::Architecture, 0.25),
        (SpecialistCategory::Performance, 0.20),
        (SpecialistCategory::Ux, 0.15),
        (SpecialistCategory::General, 0.05),
    ])
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            weights: default_weights(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Latency samples kept per provider
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
}

fn default_latency_window() -> usize {
    100
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            latency_window: default_latency_window(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.swarmforge/config.toml).
    ///
    /// Environment overrides:
    /// - `SWARMFORGE_PROVIDER_ORDER` — comma-separated provider ids
    /// - `SWARMFORGE_MODEL` — default model
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(order) = std::env::var("SWARMFORGE_PROVIDER_ORDER") {
            let order = parse_provider_list(&order);
            if !order.is_empty() {
                self.provider_order = order;
            }
        }

        if let Ok(model) = std::env::var("SWARMFORGE_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".swarmforge")
    }

    /// Default location of the JSONL memory file.
    pub fn memory_path() -> PathBuf {
        Self::config_dir().join("memory").join("memories.jsonl")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=100.0).contains(&self.convergence.threshold) {
            return Err(ConfigError::ValidationError(
                "convergence.threshold must be between 0 and 100".into(),
            ));
        }

        if !(1..=10).contains(&self.convergence.max_iterations) {
            return Err(ConfigError::ValidationError(
                "convergence.max_iterations must be between 1 and 10".into(),
            ));
        }

        if let Some(floor) = self.convergence.hard_floor {
            if floor < 0.0 || floor > self.convergence.threshold {
                return Err(ConfigError::ValidationError(
                    "convergence.hard_floor must be between 0 and the threshold".into(),
                ));
            }
        }

        if self.rate_limit.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.capacity must be > 0".into(),
            ));
        }

        if self.rate_limit.refill_per_second <= 0.0 || !self.rate_limit.refill_per_second.is_finite() {
            return Err(ConfigError::ValidationError(
                "rate_limit.refill_per_second must be > 0".into(),
            ));
        }

        if self.memory.embedding_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "memory.embedding_dimension must be > 0".into(),
            ));
        }

        if self.aggregator.weights.values().any(|w| *w < 0.0) {
            return Err(ConfigError::ValidationError(
                "aggregator weights must be non-negative".into(),
            ));
        }

        if self.aggregator.weights.values().sum::<f64>() <= 0.0 {
            return Err(ConfigError::ValidationError(
                "aggregator weights must sum to more than 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider_order: default_provider_order(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            memory: MemoryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            swarm: SwarmConfig::default(),
            convergence: ConvergenceConfig::default(),
            aggregator: AggregatorConfig::default(),
            telemetry: TelemetryConfig::default(),
            agents: vec![],
        }
    }
}

/// Split a comma-separated provider list, dropping blanks.
pub fn parse_provider_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_core::agent::AgentRole;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider_order[0], "openrouter");
        assert_eq!(config.rate_limit.capacity, 20);
        assert_eq!(config.convergence.max_iterations, 3);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider_order, config.provider_order);
        assert_eq!(parsed.memory.top_k, config.memory.top_k);
        assert_eq!(parsed.aggregator.weights.len(), 5);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn iteration_cap_enforced() {
        let mut config = AppConfig::default();
        config.convergence.max_iterations = 11;
        assert!(config.validate().is_err());
        config.convergence.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn hard_floor_above_threshold_rejected() {
        let mut config = AppConfig::default();
        config.convergence.hard_floor = Some(90.0);
        assert!(config.validate().is_err());
        config.convergence.hard_floor = Some(40.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_weights_rejected() {
        let mut config = AppConfig::default();
        for w in config.aggregator.weights.values_mut() {
            *w = 0.0;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().provider_order.len(), 3);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
provider_order = ["openai"]

[providers.openai]
api_key = "sk-test"
embedding_model = "text-embedding-3-small"

[rate_limit]
capacity = 5
refill_per_second = 0.5

[aggregator.weights]
security = 1.0
ux = 1.0
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.provider_order, vec!["openai".to_string()]);
        assert_eq!(config.rate_limit.capacity, 5);
        let openai = &config.providers["openai"];
        assert_eq!(openai.timeout_secs, 120);
        assert_eq!(openai.embedding_model.as_deref(), Some("text-embedding-3-small"));
        assert_eq!(config.aggregator.weights.len(), 2);
    }

    #[test]
    fn invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider_order = 42").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn custom_agents_parse() {
        let toml_str = r#"
[[agents]]
id = "plan"
name = "Planner"
role = "planner"
prompt_template = "Plan: {task}"

[[agents]]
id = "code"
name = "Coder"
role = "coder"
prompt_template = "Code: {task}\n{context}"
preferred_model = "gpt-4o"
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[0].role, AgentRole::Planner);
        assert!(!config.agents[1].enabled);
        assert_eq!(config.agents[1].preferred_model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn agent_without_template_uses_role_default() {
        let toml_str = r#"
[[agents]]
id = "test"
name = "Tester"
role = "tester"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agents[0].prompt_template, AgentRole::Tester.default_template());
        assert!(config.agents[0].enabled);
    }

    #[test]
    fn provider_debug_redacts_key() {
        let cfg = ProviderConfig {
            api_key: Some("sk-secret".into()),
            api_url: None,
            default_model: None,
            embedding_model: None,
            timeout_secs: 30,
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn provider_list_parsing() {
        assert_eq!(
            parse_provider_list(" openai, ,anthropic "),
            vec!["openai".to_string(), "anthropic".to_string()]
        );
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("threshold"));
    }
}
