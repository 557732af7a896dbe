//! Traits for the text-generation and embedding capabilities.
//!
//! Implemented by provider crates (e.g. `sqlrag-gemini`). Transport,
//! authentication and timeouts belong to the implementation; the core only
//! sees a prompt going in and a [`Completion`] or vector coming out.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};

// ─── Requests ────────────────────────────────────────────────────────────────

/// Optional sampling parameters passed through to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
  pub temperature:       Option<f32>,
  pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
  pub prompt: String,
  pub params: GenerationParams,
}

impl CompletionRequest {
  pub fn new(prompt: impl Into<String>) -> Self {
    Self { prompt: prompt.into(), params: GenerationParams::default() }
  }

  pub fn with_params(mut self, params: GenerationParams) -> Self {
    self.params = params;
    self
  }
}

// ─── Responses ───────────────────────────────────────────────────────────────

/// One safety rating reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyRating {
  pub category:    String,
  pub probability: String,
}

/// Detail attached to a content-policy refusal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyFeedback {
  pub block_reason: Option<String>,
  pub ratings:      Vec<SafetyRating>,
}

impl fmt::Display for SafetyFeedback {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.block_reason.as_deref().unwrap_or("unspecified"))?;
    if !self.ratings.is_empty() {
      let ratings: Vec<String> = self
        .ratings
        .iter()
        .map(|r| format!("{}={}", r.category, r.probability))
        .collect();
      write!(f, " [{}]", ratings.join(", "))?;
    }
    Ok(())
  }
}

/// What the provider produced for a prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
  /// Text of the first candidate.
  Candidate(String),
  /// The provider refused the prompt on content-policy grounds.
  Blocked(SafetyFeedback),
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Maps a prompt to generated text.
///
/// Absent or malformed provider responses are reported through
/// `Self::Error`; a refusal is a successful [`Completion::Blocked`].
pub trait TextModel: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn complete<'a>(
    &'a self,
    request: &'a CompletionRequest,
  ) -> impl Future<Output = Result<Completion, Self::Error>> + Send + 'a;
}

/// Maps text to a fixed-length vector.
pub trait EmbeddingModel: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn embed<'a>(
    &'a self,
    text: &'a str,
  ) -> impl Future<Output = Result<Vec<f32>, Self::Error>> + Send + 'a;
}
