// promptforge — Model-targeted prompt assembly for code-generation agents
// License: Apache-2.0

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("home directory not found")]
    NoHomeDir,
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Directory holding the artifact JSON files.
    #[serde(default = "default_resources_dir")]
    pub dir: String,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            dir: default_resources_dir(),
        }
    }
}

fn default_resources_dir() -> String {
    ".project-resources".to_string()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_true")]
    pub use_classifier: bool,
    #[serde(default = "default_true")]
    pub use_optimizer: bool,
    /// Selected artifacts scoring below this are flagged as borderline.
    #[serde(default = "default_relevance_cutoff")]
    pub relevance_cutoff: f64,
    #[serde(default = "default_model_profile")]
    pub default_model_profile: String,
    #[serde(default)]
    pub keyword_threshold: f64,
    #[serde(default = "default_true")]
    pub always_include_business_goals: bool,
    #[serde(default = "default_true")]
    pub always_include_agent_guidelines: bool,
    #[serde(default = "default_min_length_ratio")]
    pub min_length_ratio: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_classifier: true,
            use_optimizer: true,
            relevance_cutoff: default_relevance_cutoff(),
            default_model_profile: default_model_profile(),
            keyword_threshold: 0.0,
            always_include_business_goals: true,
            always_include_agent_guidelines: true,
            min_length_ratio: default_min_length_ratio(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_relevance_cutoff() -> f64 {
    0.5
}
fn default_model_profile() -> String {
    "gpt-4-turbo-preview".to_string()
}
fn default_min_length_ratio() -> f64 {
    0.5
}

// ---------------------------------------------------------------------------
// Judge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_model_profile")]
    pub model: String,
    #[serde(default = "default_classifier_temperature")]
    pub classifier_temperature: f64,
    #[serde(default = "default_optimizer_temperature")]
    pub optimizer_temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: default_model_profile(),
            classifier_temperature: default_classifier_temperature(),
            optimizer_temperature: default_optimizer_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_classifier_temperature() -> f64 {
    0.3
}
fn default_optimizer_temperature() -> f64 {
    0.5
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderEntry,
    #[serde(default)]
    pub openrouter: ProviderEntry,
    #[serde(default)]
    pub anthropic: ProviderEntry,
    #[serde(default)]
    pub groq: ProviderEntry,
    #[serde(default)]
    pub gemini: ProviderEntry,
    #[serde(default)]
    pub vllm: ProviderEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderEntry {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: String,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Endpoint used when a provider entry leaves `api_base` empty.
/// vLLM has no public endpoint and keeps the empty base.
pub fn default_api_base(provider: &str) -> &'static str {
    match provider {
        "openai" => "https://api.openai.com/v1",
        "anthropic" => "https://api.anthropic.com/v1",
        "gemini" => "https://generativelanguage.googleapis.com/v1beta/openai",
        "groq" => "https://api.groq.com/openai/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        _ => "",
    }
}

fn resolved(entry: &ProviderEntry, name: &str) -> (String, String, String) {
    let base = if entry.api_base.is_empty() {
        default_api_base(name).to_string()
    } else {
        entry.api_base.clone()
    };
    (entry.api_key.clone(), base, name.to_string())
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply environment variable overrides (prefix: PROMPTFORGE_)
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PROMPTFORGE_RESOURCES_DIR") {
            self.resources.dir = v;
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_PIPELINE_USE_CLASSIFIER") {
            self.pipeline.use_classifier = v.parse().unwrap_or(true);
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_PIPELINE_USE_OPTIMIZER") {
            self.pipeline.use_optimizer = v.parse().unwrap_or(true);
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_PIPELINE_RELEVANCE_CUTOFF") {
            if let Ok(n) = v.parse() {
                self.pipeline.relevance_cutoff = n;
            }
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_PIPELINE_DEFAULT_MODEL_PROFILE") {
            self.pipeline.default_model_profile = v;
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_JUDGE_MODEL") {
            self.judge.model = v;
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_JUDGE_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.judge.timeout_secs = n;
            }
        }
        // Provider overrides
        if let Ok(v) = std::env::var("PROMPTFORGE_PROVIDERS_OPENAI_API_KEY") {
            self.providers.openai.api_key = v;
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_PROVIDERS_OPENAI_API_BASE") {
            self.providers.openai.api_base = v;
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_PROVIDERS_OPENROUTER_API_KEY") {
            self.providers.openrouter.api_key = v;
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_PROVIDERS_ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = v;
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_PROVIDERS_GROQ_API_KEY") {
            self.providers.groq.api_key = v;
        }
        if let Ok(v) = std::env::var("PROMPTFORGE_PROVIDERS_GEMINI_API_KEY") {
            self.providers.gemini.api_key = v;
        }
    }

    /// Resolve the resources directory, expanding `~` to home directory.
    pub fn resources_path(&self) -> Result<PathBuf, ConfigError> {
        let dir = &self.resources.dir;
        if let Some(stripped) = dir.strip_prefix('~') {
            let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
            Ok(home.join(dir.strip_prefix("~/").unwrap_or(stripped)))
        } else {
            Ok(PathBuf::from(dir))
        }
    }

    /// Get the default config file path: ~/.promptforge/config.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".promptforge").join("config.json"))
    }

    /// Find the API key and base URL for the judge model.
    /// Returns (api_key, api_base, provider_name).
    pub fn resolve_provider(&self) -> Option<(String, String, String)> {
        let model = self.judge.model.to_lowercase();

        let entries: Vec<(&str, &ProviderEntry, &str)> = vec![
            ("claude", &self.providers.anthropic, "anthropic"),
            ("gpt", &self.providers.openai, "openai"),
            ("o1", &self.providers.openai, "openai"),
            ("o3", &self.providers.openai, "openai"),
            ("gemini", &self.providers.gemini, "gemini"),
            ("llama", &self.providers.groq, "groq"),
            ("mixtral", &self.providers.groq, "groq"),
        ];

        // Try model-name matching first
        for (prefix, entry, name) in &entries {
            if model.contains(prefix) && !entry.api_key.is_empty() {
                return Some(resolved(entry, name));
            }
        }

        // Fall back: try OpenRouter (works with most models)
        if !self.providers.openrouter.api_key.is_empty() {
            return Some(resolved(&self.providers.openrouter, "openrouter"));
        }

        // Fall back: first non-empty key
        let all_providers: Vec<(&str, &ProviderEntry)> = vec![
            ("openai", &self.providers.openai),
            ("anthropic", &self.providers.anthropic),
            ("groq", &self.providers.groq),
            ("gemini", &self.providers.gemini),
            ("vllm", &self.providers.vllm),
        ];

        all_providers
            .into_iter()
            .find(|(_, entry)| !entry.api_key.is_empty())
            .map(|(name, entry)| resolved(entry, name))
    }

    /// Validate ranges and endpoint URLs. A missing API key is not an error:
    /// the pipeline then runs on the keyword path only.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |field: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("{} is outside [0, 1]", v),
                })
            }
        };
        unit("pipeline.relevance_cutoff", self.pipeline.relevance_cutoff)?;
        unit("pipeline.keyword_threshold", self.pipeline.keyword_threshold)?;
        unit("pipeline.min_length_ratio", self.pipeline.min_length_ratio)?;

        if self.judge.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "judge.timeout_secs".into(),
                message: "must be greater than zero".into(),
            });
        }

        let bases = [
            ("providers.openai.api_base", &self.providers.openai.api_base),
            ("providers.openrouter.api_base", &self.providers.openrouter.api_base),
            ("providers.anthropic.api_base", &self.providers.anthropic.api_base),
            ("providers.groq.api_base", &self.providers.groq.api_base),
            ("providers.gemini.api_base", &self.providers.gemini.api_base),
            ("providers.vllm.api_base", &self.providers.vllm.api_base),
        ];
        for (field, base) in bases {
            if !base.is_empty() {
                url::Url::parse(base).map_err(|e| ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: e.to_string(),
                })?;
            }
        }

        if self.pipeline.use_classifier && self.resolve_provider().is_none() {
            tracing::warn!("Classifier is enabled but no provider key is configured; keyword selection will be used");
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
