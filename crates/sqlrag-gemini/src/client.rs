//! Async HTTP client for the Gemini REST API.

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use sqlrag_core::model::{Completion, CompletionRequest, EmbeddingModel, TextModel};

use crate::{
  Error, Result,
  config::GeminiConfig,
  wire::{EmbedContentRequest, GenerateContentRequest, parse_completion, parse_embedding},
};

/// Gemini text generation and embedding over HTTPS.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone, Debug)]
pub struct GeminiClient {
  http:   Client,
  config: GeminiConfig,
}

impl GeminiClient {
  pub fn new(config: GeminiConfig) -> Result<Self> {
    if config.api_key.trim().is_empty() {
      return Err(Error::MissingApiKey);
    }
    let http = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { http, config })
  }

  /// `{api_base}/models/{model}:{method}`. Accepts model names with or
  /// without the `models/` prefix.
  fn url(&self, model: &str, method: &str) -> String {
    format!(
      "{}/models/{}:{}",
      self.config.api_base.trim_end_matches('/'),
      model.trim_start_matches("models/"),
      method
    )
  }

  async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<String> {
    let resp = self
      .http
      .post(url)
      .header("x-goog-api-key", &self.config.api_key)
      .json(body)
      .send()
      .await?;

    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
      return Err(Error::Status { status, body: text });
    }
    Ok(text)
  }
}

impl TextModel for GeminiClient {
  type Error = Error;

  async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
    let url = self.url(&self.config.generation_model, "generateContent");
    debug!(model = %self.config.generation_model, prompt_len = request.prompt.len(), "generateContent");

    let body = self.post(&url, &GenerateContentRequest::new(request)).await?;
    let completion = parse_completion(&body)?;
    if let Completion::Blocked(feedback) = &completion {
      debug!(%feedback, "generation refused");
    }
    Ok(completion)
  }
}

impl EmbeddingModel for GeminiClient {
  type Error = Error;

  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    let url = self.url(&self.config.embedding_model, "embedContent");
    let body = self.post(&url, &EmbedContentRequest::new(text)).await?;
    let values = parse_embedding(&body)?;
    debug!(model = %self.config.embedding_model, dimension = values.len(), "embedContent");
    Ok(values)
  }
}
