//! Loader for the Triage configuration with YAML + environment overlays.
//!
//! Sources, lowest precedence first: an optional YAML file (`triage.yaml`),
//! inline YAML (tests), then `TRIAGE__`-prefixed environment variables using
//! `__` as the nesting separator (`TRIAGE__LLM__MODEL=gemini-1.5-flash`).
//! After merging, `${VAR}` placeholders inside string values are expanded.
//! Every section has defaults, so an empty source set yields a usable config
//! as long as a provider credential can be found.
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use triage_common::observability::{LogConfig, LogFormat};
use triage_common::{GenerationOptions, LlmConfig};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// File name looked up in the working directory and the user config dir.
pub const DEFAULT_CONFIG_FILE: &str = "triage.yaml";

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("{env_var} not found for the {provider} provider")]
    MissingApiKey {
        provider: Provider,
        env_var: &'static str,
    },

    #[error("unknown provider '{0}' (expected gemini, openai or ollama)")]
    UnknownProvider(String),
}

impl ConfigError {
    /// Step-by-step instructions shown before the process exits.
    pub fn remediation(&self) -> Vec<String> {
        match self {
            ConfigError::MissingApiKey { env_var, .. } => vec![
                "Copy .env.example to .env".to_string(),
                format!("Add your API key to the .env file as {env_var}=<key>"),
                "Or set llm.api_key in triage.yaml".to_string(),
                "Restart the application".to_string(),
            ],
            ConfigError::UnknownProvider(_) => {
                vec!["Set llm.provider to one of: gemini, openai, ollama".to_string()]
            }
            ConfigError::Load(_) => vec![
                "Check the YAML syntax of your configuration file".to_string(),
                "Check TRIAGE__* environment variables for typos".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    OpenAi,
    Ollama,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.5-flash",
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Ollama => "llama3.2:3b",
        }
    }

    fn api_key_env(self) -> Option<&'static str> {
        match self {
            Provider::Gemini => Some(GEMINI_API_KEY_ENV),
            Provider::OpenAi => Some(OPENAI_API_KEY_ENV),
            Provider::Ollama => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
        })
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub llm: LlmSection,
    pub retry: RetrySection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: Provider,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetrySection {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: false,
            filter: "info".to_string(),
        }
    }
}

impl LoggingSection {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
            ..LogConfig::default()
        }
    }
}

impl TriageConfig {
    /// Apply command-line overrides on top of the loaded sources.
    pub fn with_overrides(mut self, provider: Option<Provider>, model: Option<String>) -> Self {
        if let Some(p) = provider {
            if p != self.llm.provider {
                // A model name only makes sense for the provider it was written for.
                self.llm.model = None;
            }
            self.llm.provider = p;
        }
        if model.is_some() {
            self.llm.model = model;
        }
        self
    }

    pub fn generation_options(&self) -> GenerationOptions {
        let defaults = GenerationOptions::default();
        GenerationOptions {
            temperature: self.llm.temperature.or(defaults.temperature),
            max_tokens: self.llm.max_tokens.or(defaults.max_tokens),
        }
    }

    /// Resolve the provider section into a client configuration.
    ///
    /// Missing, empty, or unexpanded (`${...}`) keys fall back to the
    /// provider's conventional environment variable.
    pub fn llm_config(&self) -> Result<LlmConfig, ConfigError> {
        let llm = &self.llm;
        let model = llm
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| llm.provider.default_model().to_string());

        match llm.provider {
            Provider::Gemini => Ok(LlmConfig::Gemini {
                api_key: resolve_api_key(llm.provider, llm.api_key.as_deref())?,
                model,
                base_url: llm.endpoint.clone(),
            }),
            Provider::OpenAi => Ok(LlmConfig::OpenAi {
                api_key: resolve_api_key(llm.provider, llm.api_key.as_deref())?,
                model,
                base_url: llm.endpoint.clone(),
            }),
            Provider::Ollama => Ok(LlmConfig::Ollama {
                base_url: llm
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
                model,
            }),
        }
    }
}

fn usable_key(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|k| !k.is_empty() && !k.contains("${"))
        .map(str::to_string)
}

fn resolve_api_key(provider: Provider, configured: Option<&str>) -> Result<String, ConfigError> {
    if let Some(key) = usable_key(configured) {
        return Ok(key);
    }
    let Some(env_var) = provider.api_key_env() else {
        return Ok(String::new());
    };
    usable_key(std::env::var(env_var).ok().as_deref())
        .ok_or(ConfigError::MissingApiKey { provider, env_var })
}

/// First existing `triage.yaml` in the working directory or the user config dir.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|d| d.join("triage").join(DEFAULT_CONFIG_FILE))
        .filter(|p| p.is_file())
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct TriageConfigLoader {
    files: Vec<(PathBuf, bool)>,
    inline: Vec<String>,
}

impl Default for TriageConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TriageConfigLoader {
    /// Start with no files; `TRIAGE__` env overrides are always applied last.
    ///
    /// ```
    /// use triage_config::{Provider, TriageConfigLoader};
    ///
    /// let config = TriageConfigLoader::new()
    ///     .with_yaml_str("llm:\n  provider: ollama\n")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.llm.provider, Provider::Ollama);
    /// assert_eq!(config.retry.max_retries, 3);
    /// ```
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            inline: Vec::new(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), true));
        self
    }

    /// Attach a file that is skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), false));
        self
    }

    /// Merge an inline YAML snippet.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.inline.push(yaml.to_string());
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use triage_config::TriageConfigLoader;
    ///
    /// temp_env::with_var("TRIAGE_DOC_KEY", Some("from-env"), || {
    ///     let config = TriageConfigLoader::new()
    ///         .with_yaml_str("llm:\n  api_key: \"${TRIAGE_DOC_KEY}\"\n")
    ///         .load()
    ///         .expect("valid configuration");
    ///     assert_eq!(config.llm.api_key.as_deref(), Some("from-env"));
    /// });
    /// ```
    pub fn load(self) -> Result<TriageConfig, ConfigError> {
        let mut builder = Config::builder();
        for (path, required) in &self.files {
            builder = builder.add_source(File::from(path.as_path()).required(*required));
        }
        for yaml in &self.inline {
            builder = builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        }
        builder = builder.add_source(
            Environment::with_prefix("TRIAGE")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: TriageConfig = serde_json::from_value(v)
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!({ "k": ["X=${FOO}"] });
                expand_env_in_value(&mut v);
                assert_eq!(v, json!({ "k": ["X=start-mid-qux-end"] }));
            },
        );
    }

    #[test]
    fn stops_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST_TRIAGE}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST_TRIAGE}"));
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("Gemini".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!(" openai ".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!(matches!(
            "claude".parse::<Provider>(),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn unexpanded_placeholder_is_not_a_key() {
        assert_eq!(usable_key(Some("${GEMINI_API_KEY}")), None);
        assert_eq!(usable_key(Some("   ")), None);
        assert_eq!(usable_key(Some(" abc ")).as_deref(), Some("abc"));
    }

    #[test]
    fn missing_gemini_key_is_reported_with_env_var() {
        temp_env::with_var_unset(GEMINI_API_KEY_ENV, || {
            let err = TriageConfig::default().llm_config().unwrap_err();
            match err {
                ConfigError::MissingApiKey { provider, env_var } => {
                    assert_eq!(provider, Provider::Gemini);
                    assert_eq!(env_var, GEMINI_API_KEY_ENV);
                }
                other => panic!("unexpected error: {other}"),
            }
        });
    }

    #[test]
    fn gemini_key_falls_back_to_env() {
        temp_env::with_var(GEMINI_API_KEY_ENV, Some("g-key"), || {
            match TriageConfig::default().llm_config().unwrap() {
                LlmConfig::Gemini { api_key, model, .. } => {
                    assert_eq!(api_key, "g-key");
                    assert_eq!(model, "gemini-2.5-flash");
                }
                other => panic!("unexpected config: {other:?}"),
            }
        });
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut cfg = TriageConfig::default();
        cfg.llm.provider = Provider::Ollama;
        match cfg.llm_config().unwrap() {
            LlmConfig::Ollama { base_url, model } => {
                assert_eq!(base_url, "http://localhost:11434");
                assert_eq!(model, "llama3.2:3b");
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn switching_provider_drops_stale_model() {
        let mut cfg = TriageConfig::default();
        cfg.llm.model = Some("gemini-1.5-flash".into());
        let cfg = cfg.with_overrides(Some(Provider::Ollama), None);
        assert_eq!(cfg.llm.provider, Provider::Ollama);
        assert!(cfg.llm.model.is_none());

        let cfg = cfg.with_overrides(None, Some("mistral".into()));
        assert_eq!(cfg.llm.model.as_deref(), Some("mistral"));
    }

    #[test]
    fn generation_options_fall_back_to_defaults() {
        let mut cfg = TriageConfig::default();
        cfg.llm.temperature = Some(0.1);
        let opts = cfg.generation_options();
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(2048));
    }
}
