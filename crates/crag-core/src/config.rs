//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`). Provides helpers to expand
//! `~` and `${VAR}` and to resolve relative paths against the config directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::data_processor::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::Metric;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
    env_name: String,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(dir, &env_name)
    }

    pub fn load_for_env(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf(), env_name: env_name.to_string() };
        config.validate_for_env()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Typed view of the merged configuration, with paths anchored at the config dir.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.base_dir = self.base_dir.clone();
        settings.validate()?;
        Ok(settings)
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    fn validate_for_env(&self) -> Result<()> {
        match self.env_name.as_str() {
            "prod" | "production" => {
                for flag in ["APP_USE_FAKE_EMBEDDINGS", "APP_USE_FAKE_GENERATOR"] {
                    if env_flag(flag) {
                        return Err(Error::InvalidConfig(format!("{} must not be set in production", flag)));
                    }
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

/// Reads a boolean-ish env var (`1`, `true`, `yes`).
pub fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub prompt: PromptSettings,
    pub evaluation: EvaluationSettings,
    pub chunking: ChunkingConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSettings {
    pub index_path: String,
    pub metadata_path: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            index_path: "vector_store/chunks.idx".to_string(),
            metadata_path: "vector_store/metadata.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: String,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: "models/all-MiniLM-L6-v2".to_string(), dim: 384, max_len: 256, batch_size: 64 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    pub model_dir: String,
    pub max_new_tokens: usize,
    /// 0 disables the timeout.
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self { model_dir: "models/flan-t5-small".to_string(), max_new_tokens: 200, timeout_secs: 120 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_k: usize,
    pub metric: Metric,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { default_k: 5, metric: Metric::Cosine }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromptSettings {
    pub instruction: String,
    pub context_label: String,
    pub question_label: String,
    pub answer_cue: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            instruction: "You are a financial analyst assistant for CrediTrust.\n\
                          Answer the question using ONLY the following context.\n\
                          If the answer is not in the context, say you don't have enough information."
                .to_string(),
            context_label: "Context:".to_string(),
            question_label: "Question:".to_string(),
            answer_cue: "Answer:".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluationSettings {
    pub output_path: String,
    pub top_sources: usize,
    pub source_chars: usize,
    pub workers: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self { output_path: "rag_evaluation.csv".to_string(), top_sources: 2, source_chars: 200, workers: 1 }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.default_k == 0 {
            return Err(Error::InvalidConfig("retrieval.default_k must be positive".into()));
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".into()));
        }
        if self.prompt.answer_cue.trim().is_empty() {
            return Err(Error::InvalidConfig("prompt.answer_cue cannot be empty".into()));
        }
        if self.evaluation.workers == 0 {
            return Err(Error::InvalidConfig("evaluation.workers must be positive".into()));
        }
        self.chunking.validate()
    }

    pub fn index_path(&self) -> PathBuf {
        resolve_with_base(&self.base_dir, &self.data.index_path)
    }

    pub fn metadata_path(&self) -> PathBuf {
        resolve_with_base(&self.base_dir, &self.data.metadata_path)
    }

    pub fn embedding_model_dir(&self) -> PathBuf {
        resolve_with_base(&self.base_dir, &self.embedding.model_dir)
    }

    pub fn generation_model_dir(&self) -> PathBuf {
        resolve_with_base(&self.base_dir, &self.generation.model_dir)
    }

    pub fn evaluation_output_path(&self) -> PathBuf {
        resolve_with_base(&self.base_dir, &self.evaluation.output_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
