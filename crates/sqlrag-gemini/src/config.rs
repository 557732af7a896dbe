use std::{fmt, time::Duration};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "embedding-001";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the Gemini API.
#[derive(Clone)]
pub struct GeminiConfig {
  pub api_key:          String,
  pub api_base:         String,
  pub generation_model: String,
  pub embedding_model:  String,
  pub timeout:          Duration,
}

impl GeminiConfig {
  /// Settings for the public endpoint and default models.
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      api_key:          api_key.into(),
      api_base:         DEFAULT_API_BASE.to_owned(),
      generation_model: DEFAULT_GENERATION_MODEL.to_owned(),
      embedding_model:  DEFAULT_EMBEDDING_MODEL.to_owned(),
      timeout:          DEFAULT_TIMEOUT,
    }
  }
}

impl fmt::Debug for GeminiConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("GeminiConfig")
      .field("api_key", &"<redacted>")
      .field("api_base", &self.api_base)
      .field("generation_model", &self.generation_model)
      .field("embedding_model", &self.embedding_model)
      .field("timeout", &self.timeout)
      .finish()
  }
}
