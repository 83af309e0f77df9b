//! Configuration loading, validation, and management for urbanroute.
//!
//! Loads configuration from `~/.urbanroute/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use urbanroute_core::{Label, LabelMap};

/// The root configuration structure.
///
/// Maps directly to `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the trained intent checkpoint
    #[serde(default = "default_checkpoint")]
    pub checkpoint: PathBuf,

    /// Classification thresholds, cache, and keyword fallback
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Log level and output format
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Chat-completion backend shared by the LLM-based responders
    #[serde(default)]
    pub llm: LlmConfig,

    /// Per-responder settings
    #[serde(default)]
    pub responders: RespondersConfig,
}

fn default_checkpoint() -> PathBuf {
    PathBuf::from("checkpoints/dispatcher")
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Below this primary probability the keyword fallback is consulted
    #[serde(default = "default_primary_threshold")]
    pub primary_threshold: f32,

    /// Minimum probability for a non-primary label to be dispatched too
    #[serde(default = "default_secondary_threshold")]
    pub secondary_threshold: f32,

    /// Maximum number of memoized embeddings
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Per-label keyword alternatives replacing the built-in lists.
    /// Keys are label names (aliases accepted).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keywords: BTreeMap<String, Vec<String>>,
}

fn default_primary_threshold() -> f32 {
    0.50
}
fn default_secondary_threshold() -> f32 {
    0.35
}
fn default_cache_capacity() -> usize {
    256
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            primary_threshold: default_primary_threshold(),
            secondary_threshold: default_secondary_threshold(),
            cache_capacity: default_cache_capacity(),
            keywords: BTreeMap::new(),
        }
    }
}

impl RoutingConfig {
    /// Keyword overrides keyed by label. `None` keeps the built-in list.
    pub fn keyword_overrides(&self) -> Result<LabelMap<Option<Vec<String>>>, ConfigError> {
        let mut overrides: LabelMap<Option<Vec<String>>> = LabelMap::default();
        for (name, alternatives) in &self.keywords {
            let label: Label = name
                .parse()
                .map_err(|e| ConfigError::ValidationError(format!("routing.keywords: {e}")))?;
            if overrides[label].is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "routing.keywords: label '{label}' is configured more than once"
                )));
            }
            overrides[label] = Some(alternatives.clone());
        }
        Ok(overrides)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// A level (trace | debug | info | warn | error | off) or a filter
    /// directive list such as `info,urbanroute_dispatcher=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible API root (without `/chat/completions`)
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Default model for responders that don't set their own
    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".into()
}
fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RespondersConfig {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub culture: ChatResponderConfig,

    #[serde(default)]
    pub leisure: ChatResponderConfig,
}

impl RespondersConfig {
    /// Whether the responder for `label` should be registered.
    pub fn is_enabled(&self, label: Label) -> bool {
        match label {
            Label::Transport => self.transport.enabled,
            Label::Weather => self.weather.enabled,
            Label::Culture => self.culture.enabled,
            Label::Leisure => self.leisure.enabled,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overrides `llm.model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_maps_api_key: Option<String>,

    #[serde(default = "default_directions_url")]
    pub directions_url: String,

    /// Language for route instructions
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_directions_url() -> String {
    "https://maps.googleapis.com/maps/api/directions/json".into()
}
fn default_language() -> String {
    "fr".into()
}
fn default_http_timeout() -> u64 {
    10
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            google_maps_api_key: None,
            directions_url: default_directions_url(),
            language: default_language(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("enabled", &self.enabled)
            .field("model", &self.model)
            .field("google_maps_api_key", &redact(&self.google_maps_api_key))
            .field("directions_url", &self.directions_url)
            .field("language", &self.language)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".into()
}
fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}
fn default_timezone() -> String {
    "Europe/Paris".into()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            timezone: default_timezone(),
            language: default_language(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Settings for an LLM persona responder (culture, leisure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overrides `llm.model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Overrides the responder's built-in persona
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for ChatResponderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            system_prompt: None,
        }
    }
}

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Accepts `level` or comma-separated `level` / `target=level` directives.
fn valid_log_filter(filter: &str) -> bool {
    !filter.trim().is_empty()
        && filter.split(',').all(|directive| {
            let level = match directive.trim().split_once('=') {
                Some((target, level)) if !target.trim().is_empty() => level,
                Some(_) => return false,
                None => directive,
            };
            LOG_LEVELS.contains(&level.trim())
        })
}

impl AppConfig {
    /// Load configuration from the default path (~/.urbanroute/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides:
    /// - `URBANROUTE_CHECKPOINT`: checkpoint directory
    /// - `URBANROUTE_LOG`: log level
    /// - `URBANROUTE_API_KEY` / `OPENAI_API_KEY`: LLM key, if not in the file
    /// - `GOOGLE_MAPS_API_KEY`: directions key, if not in the file
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load `path`, apply overrides read through `lookup`, then validate the
    /// merged result once.
    pub fn load_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::read(path)?;
        config.apply_env(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `path` without validating; defaults when the file is absent.
    fn read(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("URBANROUTE_CHECKPOINT") {
            self.checkpoint = PathBuf::from(dir);
        }

        if let Some(level) = lookup("URBANROUTE_LOG") {
            self.logging.level = level.to_lowercase();
        }

        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("URBANROUTE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if self.responders.transport.google_maps_api_key.is_none() {
            self.responders.transport.google_maps_api_key = lookup("GOOGLE_MAPS_API_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".urbanroute")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let routing = &self.routing;
        for (name, value) in [
            ("primary_threshold", routing.primary_threshold),
            ("secondary_threshold", routing.secondary_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "routing.{name} must be between 0.0 and 1.0 (got {value})"
                )));
            }
        }

        if routing.cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "routing.cache_capacity must be at least 1".into(),
            ));
        }

        routing.keyword_overrides()?;

        if !valid_log_filter(&self.logging.level) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {LOG_LEVELS:?} or target=level directives (got '{}')",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Model used by the responder for `label`, falling back to `llm.model`.
    pub fn model_for(&self, label: Label) -> &str {
        let specific = match label {
            Label::Transport => self.responders.transport.model.as_deref(),
            Label::Weather => None,
            Label::Culture => self.responders.culture.model.as_deref(),
            Label::Leisure => self.responders.leisure.model.as_deref(),
        };
        specific.unwrap_or(&self.llm.model)
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            checkpoint: default_checkpoint(),
            routing: RoutingConfig::default(),
            logging: LoggingConfig::default(),
            llm: LlmConfig::default(),
            responders: RespondersConfig::default(),
        }
    }
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
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.routing.primary_threshold - 0.50).abs() < f32::EPSILON);
        assert!((config.routing.secondary_threshold - 0.35).abs() < f32::EPSILON);
        assert_eq!(config.routing.cache_capacity, 256);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.checkpoint, config.checkpoint);
        assert_eq!(parsed.routing.cache_capacity, config.routing.cache_capacity);
        assert_eq!(parsed.responders.weather.timezone, "Europe/Paris");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
checkpoint = "/opt/models/dispatcher"

[routing]
primary_threshold = 0.6

[responders.leisure]
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.checkpoint, PathBuf::from("/opt/models/dispatcher"));
        assert!((config.routing.primary_threshold - 0.6).abs() < f32::EPSILON);
        assert!((config.routing.secondary_threshold - 0.35).abs() < f32::EPSILON);
        assert!(!config.responders.is_enabled(Label::Leisure));
        assert!(config.responders.is_enabled(Label::Culture));
    }

    #[test]
    fn invalid_threshold_rejected() {
        let mut config = AppConfig::default();
        config.routing.secondary_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.routing.primary_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_cache_capacity_rejected() {
        let mut config = AppConfig::default();
        config.routing.cache_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache_capacity"));
    }

    #[test]
    fn unknown_log_level_rejected() {
        let mut config = AppConfig::default();
        for bad in ["verbose", "", "=debug", "info,urbanroute=loud", "info,,debug"] {
            config.logging.level = bad.into();
            assert!(config.validate().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn log_filter_directives_accepted() {
        let mut config = AppConfig::default();
        for good in ["off", "urbanroute_dispatcher=debug", "warn, urbanroute_classifier=trace"] {
            config.logging.level = good.into();
            assert!(config.validate().is_ok(), "rejected {good:?}");
        }
    }

    #[test]
    fn env_override_repairs_invalid_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"verbose\"\n").unwrap();

        assert!(AppConfig::load_from(&path).is_err());

        let config = AppConfig::load_with(&path, |key| {
            (key == "URBANROUTE_LOG").then(|| "urbanroute=debug".to_string())
        })
        .unwrap();
        assert_eq!(config.logging.level, "urbanroute=debug");
    }

    #[test]
    fn env_override_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let err = AppConfig::load_with(&path, |key| {
            (key == "URBANROUTE_LOG").then(|| "loud".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn keyword_overrides_parse_aliases() {
        let toml_str = r#"
[routing.keywords]
loisirs = ["concert", "brocante"]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let overrides = config.routing.keyword_overrides().unwrap();
        assert_eq!(
            overrides[Label::Leisure].as_deref(),
            Some(&["concert".to_string(), "brocante".to_string()][..])
        );
        assert!(overrides[Label::Transport].is_none());
    }

    #[test]
    fn keyword_overrides_reject_unknown_and_duplicate_labels() {
        let mut config = AppConfig::default();
        config.routing.keywords.insert("sport".into(), vec!["match".into()]);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.routing.keywords.insert("weather".into(), vec!["pluie".into()]);
        config.routing.keywords.insert("météo".into(), vec!["neige".into()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("URBANROUTE_CHECKPOINT", "/tmp/ckpt"),
            ("URBANROUTE_LOG", "DEBUG"),
            ("OPENAI_API_KEY", "sk-test"),
            ("GOOGLE_MAPS_API_KEY", "maps-test"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.checkpoint, PathBuf::from("/tmp/ckpt"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(
            config.responders.transport.google_maps_api_key.as_deref(),
            Some("maps-test")
        );
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("from-file".into());
        config.apply_env(|key| (key == "OPENAI_API_KEY").then(|| "from-env".to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        config.responders.transport.google_maps_api_key = Some("maps-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("maps-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn model_for_falls_back_to_llm_model() {
        let mut config = AppConfig::default();
        config.responders.culture.model = Some("gpt-4o".into());
        assert_eq!(config.model_for(Label::Culture), "gpt-4o");
        assert_eq!(config.model_for(Label::Leisure), "gpt-4o-mini");
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().routing.cache_capacity, 256);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "routing = 3").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("primary_threshold"));
        assert!(toml_str.contains("open-meteo"));
    }
}
