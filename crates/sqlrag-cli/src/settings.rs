//! Runtime configuration: defaults, then the legacy unprefixed path
//! variables, then an optional TOML file, then `SQLRAG_*` environment
//! variables.

use std::{path::{Path, PathBuf}, time::Duration};

use serde::Deserialize;
use sqlrag_core::{
  PipelineSettings, SemanticLayer,
  gate::GateMode,
  model::GenerationParams,
  results::{DEFAULT_EMBED_CONCURRENCY, RetentionPolicy},
};
use sqlrag_gemini::{DEFAULT_API_BASE, DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, GeminiConfig};
use sqlrag_store_sqlite::SqliteVectorStore;
use thiserror::Error;

/// Environment variable consulted when no `api_key` is configured.
pub const API_KEY_FALLBACK_VAR: &str = "GOOGLE_API_KEY";

/// Unprefixed variables from older `.env` files, mapped to config keys.
/// They rank below the file and `SQLRAG_*` variables.
pub const LEGACY_PATH_VARS: &[(&str, &str)] = &[
  ("database_path", "DATABASE_PATH"),
  ("semantic_layer_path", "SEMANTIC_LAYER_PATH"),
];

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read configuration: {0}")]
  Load(#[from] config::ConfigError),

  #[error("no Gemini API key configured (set {API_KEY_FALLBACK_VAR} or SQLRAG_API_KEY)")]
  MissingApiKey,

  #[error("`{0}` must be at least 1")]
  Zero(&'static str),

  #[error("`{key}` must be between 0 and 2, got {value}")]
  Temperature { key: &'static str, value: f32 },

  #[error("semantic layer unavailable: {0}")]
  SemanticLayer(#[from] sqlrag_core::Error),

  #[error("vector store unavailable at {path}: {source}")]
  VectorStore {
    path:   PathBuf,
    #[source]
    source: sqlrag_store_sqlite::Error,
  },
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
  pub api_key:              Option<String>,
  pub api_base:             String,
  pub generation_model:     String,
  pub embedding_model:      String,
  pub database_path:        PathBuf,
  pub semantic_layer_path:  PathBuf,
  pub vector_store_path:    PathBuf,
  pub top_k:                usize,
  pub embed_concurrency:    usize,
  pub gate:                 GateMode,
  pub retention:            RetentionPolicy,
  pub request_timeout_secs: u64,
  pub sql_temperature:      f32,
  pub answer_temperature:   f32,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      api_key:              None,
      api_base:             DEFAULT_API_BASE.to_owned(),
      generation_model:     DEFAULT_GENERATION_MODEL.to_owned(),
      embedding_model:      DEFAULT_EMBEDDING_MODEL.to_owned(),
      database_path:        PathBuf::from("data/mydatabase.db"),
      semantic_layer_path:  PathBuf::from("data/semantic_layer.json"),
      vector_store_path:    PathBuf::from("data/vectors.db"),
      top_k:                5,
      embed_concurrency:    DEFAULT_EMBED_CONCURRENCY,
      gate:                 GateMode::default(),
      retention:            RetentionPolicy::default(),
      request_timeout_secs: 60,
      sql_temperature:      0.1,
      answer_temperature:   0.5,
    }
  }
}

impl AppConfig {
  /// Layer `file` (if it exists) and the environment over the defaults.
  pub fn load(file: &Path) -> Result<Self, ConfigError> {
    Self::load_with(file, |var| std::env::var(var).ok())
  }

  /// [`AppConfig::load`] with the unprefixed variables read through
  /// `lookup`.
  fn load_with(file: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let mut builder = config::Config::builder();
    for (key, var) in LEGACY_PATH_VARS {
      if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
        builder = builder.set_default(*key, value)?;
      }
    }

    let settings = builder
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("SQLRAG")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?;

    let mut cfg: AppConfig = settings.try_deserialize()?;
    cfg.fill_api_key(lookup(API_KEY_FALLBACK_VAR));
    cfg.validate()?;
    Ok(cfg)
  }

  fn fill_api_key(&mut self, fallback: Option<String>) {
    let blank = |k: &String| k.trim().is_empty();
    if self.api_key.as_ref().is_none_or(blank) {
      self.api_key = fallback.filter(|k| !blank(k));
    }
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.top_k == 0 {
      return Err(ConfigError::Zero("top_k"));
    }
    if self.embed_concurrency == 0 {
      return Err(ConfigError::Zero("embed_concurrency"));
    }
    if self.request_timeout_secs == 0 {
      return Err(ConfigError::Zero("request_timeout_secs"));
    }
    for (key, value) in [
      ("sql_temperature", self.sql_temperature),
      ("answer_temperature", self.answer_temperature),
    ] {
      if !(0.0..=2.0).contains(&value) {
        return Err(ConfigError::Temperature { key, value });
      }
    }
    Ok(())
  }

  pub fn pipeline_settings(&self) -> PipelineSettings {
    PipelineSettings {
      top_k:             self.top_k,
      gate:              self.gate,
      retention:         self.retention,
      embed_concurrency: self.embed_concurrency,
    }
  }

  /// Sampling parameters for the SQL and answer prompts, in that order.
  pub fn generation_params(&self) -> (GenerationParams, GenerationParams) {
    let params = |t: f32| GenerationParams { temperature: Some(t), ..GenerationParams::default() };
    (params(self.sql_temperature), params(self.answer_temperature))
  }

  pub fn load_semantic_layer(&self) -> Result<SemanticLayer, ConfigError> {
    Ok(SemanticLayer::load(&self.semantic_layer_path)?)
  }

  pub async fn open_vector_store(&self) -> Result<SqliteVectorStore, ConfigError> {
    SqliteVectorStore::open(&self.vector_store_path).await.map_err(|source| {
      ConfigError::VectorStore { path: self.vector_store_path.clone(), source }
    })
  }

  pub fn gemini_config(&self) -> Result<GeminiConfig, ConfigError> {
    let api_key = self.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
    Ok(GeminiConfig {
      api_key,
      api_base:         self.api_base.clone(),
      generation_model: self.generation_model.clone(),
      embedding_model:  self.embedding_model.clone(),
      timeout:          Duration::from_secs(self.request_timeout_secs),
    })
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;

  fn temp_toml(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("sqlrag-config-{}.toml", Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn missing_file_gives_defaults() {
    let path = std::env::temp_dir().join(format!("sqlrag-absent-{}.toml", Uuid::new_v4()));
    let cfg = AppConfig::load(&path).unwrap();
    assert_eq!(cfg.generation_model, "gemini-2.0-flash");
    assert_eq!(cfg.embedding_model, "embedding-001");
    assert_eq!(cfg.database_path, PathBuf::from("data/mydatabase.db"));
    assert_eq!(cfg.pipeline_settings(), PipelineSettings::default());
  }

  #[test]
  fn file_values_override_defaults() {
    let path = temp_toml(
      r#"
      top_k = 3
      gate = "prefix"
      database_path = "/tmp/shop.db"

      [retention]
      policy = "ttl"
      seconds = 3600
      "#,
    );
    let cfg = AppConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(cfg.top_k, 3);
    assert_eq!(cfg.gate, GateMode::Prefix);
    assert_eq!(cfg.retention, RetentionPolicy::Ttl { seconds: 3600 });
    assert_eq!(cfg.database_path, PathBuf::from("/tmp/shop.db"));
    assert_eq!(cfg.embed_concurrency, DEFAULT_EMBED_CONCURRENCY);
  }

  #[test]
  fn zero_top_k_is_rejected() {
    let path = temp_toml("top_k = 0");
    let err = AppConfig::load(&path).err();
    std::fs::remove_file(&path).ok();
    assert!(matches!(err, Some(ConfigError::Zero("top_k"))), "{err:?}");
  }

  #[test]
  fn temperatures_become_generation_params() {
    let (sql, answer) = AppConfig::default().generation_params();
    assert_eq!(sql.temperature, Some(0.1));
    assert_eq!(answer.temperature, Some(0.5));
    assert_eq!(sql.max_output_tokens, None);

    let path = temp_toml("sql_temperature = 0.0\nanswer_temperature = 0.9");
    let cfg = AppConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    let (sql, answer) = cfg.generation_params();
    assert_eq!(sql.temperature, Some(0.0));
    assert_eq!(answer.temperature, Some(0.9));
  }

  #[test]
  fn out_of_range_temperature_is_rejected() {
    let path = temp_toml("answer_temperature = 3.5");
    let err = AppConfig::load(&path).err();
    std::fs::remove_file(&path).ok();
    assert!(
      matches!(err, Some(ConfigError::Temperature { key: "answer_temperature", .. })),
      "{err:?}"
    );
  }

  #[test]
  fn legacy_variables_fill_paths_below_the_file() {
    let legacy = |var: &str| match var {
      "DATABASE_PATH" => Some("/legacy/shop.db".to_owned()),
      "SEMANTIC_LAYER_PATH" => Some("/legacy/layer.json".to_owned()),
      "GOOGLE_API_KEY" => Some("legacy-key".to_owned()),
      _ => None,
    };

    let absent = std::env::temp_dir().join(format!("sqlrag-absent-{}.toml", Uuid::new_v4()));
    let cfg = AppConfig::load_with(&absent, legacy).unwrap();
    assert_eq!(cfg.database_path, PathBuf::from("/legacy/shop.db"));
    assert_eq!(cfg.semantic_layer_path, PathBuf::from("/legacy/layer.json"));
    assert_eq!(cfg.api_key.as_deref(), Some("legacy-key"));
    assert_eq!(cfg.vector_store_path, PathBuf::from("data/vectors.db"));

    let path = temp_toml(r#"database_path = "/tmp/shop.db""#);
    let cfg = AppConfig::load_with(&path, legacy).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(cfg.database_path, PathBuf::from("/tmp/shop.db"));
    assert_eq!(cfg.semantic_layer_path, PathBuf::from("/legacy/layer.json"));
  }

  #[test]
  fn blank_legacy_variables_are_ignored() {
    let absent = std::env::temp_dir().join(format!("sqlrag-absent-{}.toml", Uuid::new_v4()));
    let cfg = AppConfig::load_with(&absent, |_| Some("  ".to_owned())).unwrap();
    assert_eq!(cfg.database_path, PathBuf::from("data/mydatabase.db"));
    assert_eq!(cfg.api_key, None);
  }

  #[test]
  fn api_key_falls_back_and_ignores_blanks() {
    let mut cfg = AppConfig::default();
    cfg.fill_api_key(Some("from-env".into()));
    assert_eq!(cfg.api_key.as_deref(), Some("from-env"));

    let mut cfg = AppConfig { api_key: Some("configured".into()), ..AppConfig::default() };
    cfg.fill_api_key(Some("from-env".into()));
    assert_eq!(cfg.api_key.as_deref(), Some("configured"));

    let mut cfg = AppConfig { api_key: Some("  ".into()), ..AppConfig::default() };
    cfg.fill_api_key(Some("".into()));
    assert_eq!(cfg.api_key, None);
    assert!(matches!(cfg.gemini_config(), Err(ConfigError::MissingApiKey)));
  }

  #[test]
  fn missing_semantic_layer_is_a_config_error() {
    let cfg = AppConfig {
      semantic_layer_path: std::env::temp_dir().join(format!("absent-{}.json", Uuid::new_v4())),
      ..AppConfig::default()
    };
    let err = cfg.load_semantic_layer().unwrap_err();
    assert!(
      matches!(err, ConfigError::SemanticLayer(sqlrag_core::Error::SemanticLayerNotFound(_))),
      "{err:?}"
    );
  }

  #[tokio::test]
  async fn unopenable_vector_store_is_a_config_error() {
    let dir = std::env::temp_dir().join(format!("sqlrag-dir-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    // A directory cannot be opened as a database file.
    let cfg = AppConfig { vector_store_path: dir.clone(), ..AppConfig::default() };
    let err = cfg.open_vector_store().await.err();
    std::fs::remove_dir_all(&dir).ok();
    assert!(matches!(err, Some(ConfigError::VectorStore { .. })), "{err:?}");
  }

  #[test]
  fn gemini_config_carries_models_and_timeout() {
    let cfg = AppConfig {
      api_key: Some("k".into()),
      request_timeout_secs: 5,
      ..AppConfig::default()
    };
    let gemini = cfg.gemini_config().unwrap();
    assert_eq!(gemini.api_key, "k");
    assert_eq!(gemini.timeout, Duration::from_secs(5));
    assert_eq!(gemini.api_base, DEFAULT_API_BASE);
  }
}
