//! Configuration settings for vidquiz.

use crate::error::{Result, VidquizError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment variable overrides (e.g. `VIDQUIZ_MAX_FILE_SIZE_MB`).
pub const ENV_PREFIX: &str = "VIDQUIZ_";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub app: AppSettings,
    pub performance: PerformanceSettings,
    pub security: SecuritySettings,
    pub api: ApiSettings,
    pub store: StoreSettings,
    pub quiz: QuizSettings,
    pub logging: LoggingSettings,
    pub prompts: PromptSettings,
}

/// Input limits, retries and caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Videos larger than this are rejected before upload.
    pub max_file_size_mb: u64,
    /// Allowed file extensions, compared case-insensitively.
    pub supported_formats: Vec<String>,
    /// Upper bound on the wall-clock time of one pipeline run.
    pub session_timeout_minutes: u64,
    /// Retries per external call on transient failure.
    pub max_retry_attempts: u32,
    /// Delay before the first retry; doubles on every further attempt.
    pub retry_backoff_ms: u64,
    /// Time-to-live for cached descriptions and quizzes.
    pub cache_ttl_seconds: u64,
    /// Directory for the response cache and the default SQLite store.
    pub data_dir: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_file_size_mb: 500,
            supported_formats: ["mp4", "avi", "mov", "mkv", "webm", "flv", "m4v"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            session_timeout_minutes: 30,
            max_retry_attempts: 3,
            retry_backoff_ms: 2000,
            cache_ttl_seconds: 3600,
            data_dir: "~/.vidquiz".to_string(),
        }
    }
}

impl AppSettings {
    /// Maximum accepted file size in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes.saturating_mul(60))
    }

    /// Check whether an extension is in the allow-list.
    pub fn is_supported_format(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.').to_lowercase();
        self.supported_formats
            .iter()
            .any(|f| f.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

/// Feature toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    pub enable_caching: bool,
    pub enable_progress_tracking: bool,
    pub enable_background_processing: bool,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            enable_caching: true,
            enable_progress_tracking: true,
            enable_background_processing: false,
        }
    }
}

/// Credential handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Check credential format before the first network call.
    pub validate_api_keys: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            validate_api_keys: true,
        }
    }
}

/// Hosted model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Multimodal model used to describe videos.
    pub gemini_model: String,
    /// Chat model used to write quizzes.
    pub groq_model: String,
    /// Embedding model used for the knowledge store.
    pub embedding_model: String,
    /// Embedding dimensions.
    pub embedding_dimensions: u32,
    /// Per-call network timeout in seconds.
    pub request_timeout: u64,
    pub gemini_base_url: String,
    pub gemini_upload_url: String,
    pub groq_base_url: String,
    /// Descriptions shorter than this are treated as a failed call.
    pub min_description_chars: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            gemini_model: "gemini-2.0-flash-lite".to_string(),
            groq_model: "llama-3.3-70b-versatile".to_string(),
            embedding_model: "gemini-embedding-001".to_string(),
            embedding_dimensions: 1536,
            request_timeout: 300,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_upload_url: "https://generativelanguage.googleapis.com/upload/v1beta/files"
                .to_string(),
            groq_base_url: "https://api.groq.com/openai/v1".to_string(),
            min_description_chars: 50,
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Similarity measure used by the vector search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    Dot,
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "dot" | "dotproduct" | "dot_product" => Ok(DistanceMetric::Dot),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Euclidean => write!(f, "euclidean"),
            DistanceMetric::Dot => write!(f, "dot"),
        }
    }
}

/// Knowledge store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// `mongodb://host:port/...`, `sqlite://<path>` or `memory://`.
    pub connection_string: String,
    /// Database name (MongoDB only).
    pub database: String,
    /// Collection (MongoDB) or table (SQLite) name.
    pub collection: String,
    pub distance_metric: DistanceMetric,
    /// Reject a second record with the same video reference and description.
    pub unique_descriptions: bool,
    /// Vector search index over the embeddings (MongoDB only).
    pub vector_index: String,
    /// How long to wait for a new vector index to become queryable.
    pub index_wait_seconds: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            connection_string: "sqlite://~/.vidquiz/knowledge.db".to_string(),
            database: "vidquiz".to_string(),
            collection: "Video_Summarization".to_string(),
            distance_metric: DistanceMetric::Cosine,
            unique_descriptions: false,
            vector_index: "vector_index".to_string(),
            index_wait_seconds: 60,
        }
    }
}

/// Quiz generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
    pub min_questions: usize,
    pub max_questions: usize,
    /// How many times a malformed quiz is sent back for correction.
    pub max_parse_repairs: u32,
    pub temperature: f32,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            min_questions: 10,
            max_questions: 20,
            max_parse_repairs: 2,
            temperature: 0.7,
        }
    }
}

/// Diagnostic output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Also write logs to this file when non-empty.
    pub log_file_path: String,
    /// Print the full error chain on failure.
    pub enable_detailed_errors: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file_path: String::new(),
            enable_detailed_errors: true,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment variables named `VIDQUIZ_<KEY>` override file values.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else if path.is_some() {
            return Err(VidquizError::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        } else {
            Settings::default()
        };

        let settings = settings.with_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply overrides looked up by `VIDQUIZ_<KEY>` name.
    ///
    /// Keys are matched across all sections; the override is parsed into the
    /// type of the value it replaces. Lists are comma-separated.
    pub fn with_overrides<F>(self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut root = toml::Value::try_from(&self)
            .map_err(|e| VidquizError::Config(e.to_string()))?;

        if let Some(sections) = root.as_table_mut() {
            for (section_name, section) in sections.iter_mut() {
                let Some(table) = section.as_table_mut() else {
                    continue;
                };
                for (key, value) in table.iter_mut() {
                    let env_key = format!("{}{}", ENV_PREFIX, key.to_uppercase());
                    if let Some(raw) = lookup(&env_key) {
                        *value = parse_override(value, &raw).ok_or_else(|| {
                            VidquizError::Config(format!(
                                "Invalid value for {} ({}.{}): {}",
                                env_key, section_name, key, raw
                            ))
                        })?;
                    }
                }
            }
        }

        // Optional keys are absent from the serialized table.
        if let Some(dir) = lookup(&format!("{}CUSTOM_DIR", ENV_PREFIX)) {
            let prompts = root
                .get_mut("prompts")
                .and_then(|p| p.as_table_mut())
                .ok_or_else(|| VidquizError::Config("missing prompts section".to_string()))?;
            prompts.insert("custom_dir".to_string(), toml::Value::String(dir));
        }

        root.try_into()
            .map_err(|e: toml::de::Error| VidquizError::Config(e.to_string()))
    }

    /// Reject settings that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.quiz.min_questions == 0 {
            return Err(VidquizError::Config(
                "quiz.min_questions must be at least 1".to_string(),
            ));
        }
        if self.quiz.min_questions > self.quiz.max_questions {
            return Err(VidquizError::Config(format!(
                "quiz.min_questions ({}) exceeds quiz.max_questions ({})",
                self.quiz.min_questions, self.quiz.max_questions
            )));
        }
        if self.app.supported_formats.is_empty() {
            return Err(VidquizError::Config(
                "app.supported_formats must not be empty".to_string(),
            ));
        }
        if self.api.embedding_dimensions == 0 {
            return Err(VidquizError::Config(
                "api.embedding_dimensions must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| VidquizError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidquiz")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.app.data_dir)
    }

    /// Directory holding cached responses.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir().join("cache")
    }
}

/// Parse a raw override string into the shape of the existing value.
fn parse_override(current: &toml::Value, raw: &str) -> Option<toml::Value> {
    let raw = raw.trim();
    match current {
        toml::Value::String(_) => Some(toml::Value::String(raw.to_string())),
        toml::Value::Integer(_) => raw.parse::<i64>().ok().map(toml::Value::Integer),
        toml::Value::Float(_) => raw.parse::<f64>().ok().map(toml::Value::Float),
        toml::Value::Boolean(_) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(toml::Value::Boolean(true)),
            "false" | "0" | "no" | "off" => Some(toml::Value::Boolean(false)),
            _ => None,
        },
        toml::Value::Array(_) => Some(toml::Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_string()))
                .collect(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.app.max_file_size_mb, 500);
        assert_eq!(settings.app.max_retry_attempts, 3);
        assert_eq!(settings.app.supported_formats.len(), 7);
        assert!(settings.performance.enable_caching);
        assert!(settings.security.validate_api_keys);
        assert_eq!(settings.api.groq_model, "llama-3.3-70b-versatile");
        assert_eq!(settings.api.request_timeout, 300);
        assert_eq!(settings.quiz.min_questions, 10);
        assert_eq!(settings.quiz.max_questions, 20);
        assert_eq!(settings.store.distance_metric, DistanceMetric::Cosine);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_supported_format_is_case_insensitive() {
        let app = AppSettings::default();
        assert!(app.is_supported_format("MP4"));
        assert!(app.is_supported_format(".mkv"));
        assert!(!app.is_supported_format("gif"));
    }

    #[test]
    fn test_env_overrides() {
        let mut env = HashMap::new();
        env.insert("VIDQUIZ_MAX_FILE_SIZE_MB", "42");
        env.insert("VIDQUIZ_SUPPORTED_FORMATS", "mp4, webm");
        env.insert("VIDQUIZ_ENABLE_CACHING", "false");
        env.insert("VIDQUIZ_GROQ_MODEL", "llama-3.1-8b-instant");
        env.insert("VIDQUIZ_DISTANCE_METRIC", "euclidean");
        env.insert("VIDQUIZ_TEMPERATURE", "0.2");

        let settings = Settings::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.app.max_file_size_mb, 42);
        assert_eq!(settings.app.supported_formats, vec!["mp4", "webm"]);
        assert!(!settings.performance.enable_caching);
        assert_eq!(settings.api.groq_model, "llama-3.1-8b-instant");
        assert_eq!(settings.store.distance_metric, DistanceMetric::Euclidean);
        assert!((settings.quiz.temperature - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_unset_optional_key_can_be_overridden() {
        assert!(Settings::default().prompts.custom_dir.is_none());

        let settings = Settings::default()
            .with_overrides(|k| (k == "VIDQUIZ_CUSTOM_DIR").then(|| "~/prompts".to_string()))
            .unwrap();
        assert_eq!(settings.prompts.custom_dir.as_deref(), Some("~/prompts"));
    }

    #[test]
    fn test_store_index_overrides() {
        let settings = Settings::default()
            .with_overrides(|k| match k {
                "VIDQUIZ_VECTOR_INDEX" => Some("video_vectors".to_string()),
                "VIDQUIZ_INDEX_WAIT_SECONDS" => Some("5".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.store.vector_index, "video_vectors");
        assert_eq!(settings.store.index_wait_seconds, 5);
    }

    #[test]
    fn test_invalid_env_override_is_rejected() {
        let result = Settings::default().with_overrides(|k| {
            (k == "VIDQUIZ_MAX_RETRY_ATTEMPTS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(VidquizError::Config(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [app]
            max_file_size_mb = 10

            [store]
            connection_string = "mongodb://localhost:51083/?directConnection=true"
            "#,
        )
        .unwrap();
        assert_eq!(settings.app.max_file_size_mb, 10);
        assert_eq!(settings.app.max_retry_attempts, 3);
        assert_eq!(settings.store.collection, "Video_Summarization");
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut settings = Settings::default();
        settings.quiz.min_questions = 30;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_max_file_size_bytes() {
        let app = AppSettings {
            max_file_size_mb: 1,
            ..Default::default()
        };
        assert_eq!(app.max_file_size_bytes(), 1_048_576);
    }
}
