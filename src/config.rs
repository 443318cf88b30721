//! Pipeline configuration, persisted as TOML.
//!
//! Every key has a default, so an absent or partial `lexicon.toml` is valid.
//!
//! ```toml
//! book_dir = "book"
//!
//! [[chapters]]
//! file = "14-ХРИСТИАНСКИЕ-ИСТОЧНИКИ-О-ХАЗАРСКОМ-ВОПРОСЕ.txt"
//! tag = "14-red"
//!
//! [llm]
//! model = "openai/gpt-oss-120b"
//!
//! [queue]
//! request_delay_ms = 500
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// One chapter input file and the tag its articles are namespaced under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSpec {
    /// File name of the raw chapter text, relative to `book_dir`.
    pub file: String,
    /// Chapter tag, also the name of the article directory.
    pub tag: String,
}

impl ChapterSpec {
    pub fn new(file: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            tag: tag.into(),
        }
    }
}

/// File names of the persisted artifacts, relative to `book_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_extract_cache")]
    pub extract_cache: String,
    #[serde(default = "default_merge_cache")]
    pub merge_cache: String,
    #[serde(default = "default_primary")]
    pub primary: String,
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_groups")]
    pub groups: String,
}

fn default_extract_cache() -> String {
    "raw-extract.json".into()
}
fn default_merge_cache() -> String {
    "merge-progress.json".into()
}
fn default_primary() -> String {
    "primary.json".into()
}
fn default_directory() -> String {
    "characters.json".into()
}
fn default_groups() -> String {
    "merge-groups.toml".into()
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            extract_cache: default_extract_cache(),
            merge_cache: default_merge_cache(),
            primary: default_primary(),
            directory: default_directory(),
            groups: default_groups(),
        }
    }
}

/// Chat-completion endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model() -> String {
    "openai/gpt-oss-120b".into()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Request pacing and retry budget for collaborator calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Pause between two consecutive requests.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Total attempts per request, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Attempt `n` failing waits `n * backoff_step_ms` before the next one.
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
}

fn default_request_delay_ms() -> u64 {
    500
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_step_ms() -> u64 {
    3000
}

impl QueueConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }

    /// No pauses at all; for tests and dry runs against local fakes.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            request_delay_ms: 0,
            max_attempts,
            backoff_step_ms: 0,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            max_attempts: default_max_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding chapter files and every produced artifact.
    #[serde(default = "default_book_dir")]
    pub book_dir: PathBuf,
    #[serde(default = "default_chapters")]
    pub chapters: Vec<ChapterSpec>,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

fn default_book_dir() -> PathBuf {
    PathBuf::from("book")
}

fn default_chapters() -> Vec<ChapterSpec> {
    vec![
        ChapterSpec::new("14-ХРИСТИАНСКИЕ-ИСТОЧНИКИ-О-ХАЗАРСКОМ-ВОПРОСЕ.txt", "14-red"),
        ChapterSpec::new("16-ИСЛАМСКИЕ-ИСТОЧНИКИ-О-ХАЗАРСКОМ-ВОПРОСЕ.txt", "16-green"),
        ChapterSpec::new("18-ЕВРЕЙСКИЕ-ИСТОЧНИКИ-О-ХАЗАРСКОМ-ВОПРОСЕ.txt", "18-yellow"),
    ]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            book_dir: default_book_dir(),
            chapters: default_chapters(),
            files: FilesConfig::default(),
            llm: LlmConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a config from TOML text. `origin` only labels errors.
    pub fn from_toml(text: &str, origin: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chapters.is_empty() {
            return Err(ConfigError::NoChapters);
        }
        let mut seen = HashSet::new();
        for chapter in &self.chapters {
            if !seen.insert(chapter.tag.as_str()) {
                return Err(ConfigError::DuplicateTag {
                    tag: chapter.tag.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_three_chapters() {
        let config = PipelineConfig::default();
        let tags: Vec<&str> = config.chapters.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["14-red", "16-green", "18-yellow"]);
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.queue.request_delay(), Duration::from_millis(500));
        assert_eq!(config.files.directory, "characters.json");
    }

    #[test]
    fn empty_toml_is_default() {
        let config = PipelineConfig::from_toml("", "test").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_given_keys() {
        let text = r#"
            book_dir = "/tmp/book"

            [[chapters]]
            file = "a.txt"
            tag = "a"

            [queue]
            max_attempts = 5
        "#;
        let config = PipelineConfig::from_toml(text, "test").unwrap();
        assert_eq!(config.book_dir, PathBuf::from("/tmp/book"));
        assert_eq!(config.chapters, vec![ChapterSpec::new("a.txt", "a")]);
        assert_eq!(config.queue.max_attempts, 5);
        assert_eq!(config.queue.backoff_step_ms, 3000);
        assert_eq!(config.llm.api_key_env, "GROQ_API_KEY");
    }

    #[test]
    fn duplicate_tags_rejected() {
        let text = r#"
            [[chapters]]
            file = "a.txt"
            tag = "x"
            [[chapters]]
            file = "b.txt"
            tag = "x"
        "#;
        let err = PipelineConfig::from_toml(text, "test").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTag { .. }));
    }

    #[test]
    fn empty_chapter_list_rejected() {
        let err = PipelineConfig::from_toml("chapters = []", "test").unwrap_err();
        assert!(matches!(err, ConfigError::NoChapters));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let err = PipelineConfig::from_toml("book_dir = [", "bad.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = PipelineConfig::load_or_default(&dir.path().join("lexicon.toml")).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
