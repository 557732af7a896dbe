//! JSON bodies of the `generateContent` and `embedContent` endpoints.

use serde::{Deserialize, Serialize};
use sqlrag_core::model::{
  Completion, CompletionRequest, GenerationParams, SafetyFeedback, SafetyRating,
};

use crate::{Error, Result};

// ─── Requests ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Part<'a> {
  pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Content<'a> {
  pub parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
  fn text(text: &'a str) -> Self { Self { parts: vec![Part { text }] } }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub temperature:       Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
  fn from_params(params: GenerationParams) -> Option<Self> {
    (params != GenerationParams::default()).then_some(Self {
      temperature:       params.temperature,
      max_output_tokens: params.max_output_tokens,
    })
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
  pub contents:          Vec<Content<'a>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub generation_config: Option<GenerationConfig>,
}

impl<'a> GenerateContentRequest<'a> {
  pub fn new(request: &'a CompletionRequest) -> Self {
    Self {
      contents:          vec![Content::text(&request.prompt)],
      generation_config: GenerationConfig::from_params(request.params),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct EmbedContentRequest<'a> {
  pub content: Content<'a>,
}

impl<'a> EmbedContentRequest<'a> {
  pub fn new(text: &'a str) -> Self { Self { content: Content::text(text) } }
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  candidates:      Option<Vec<Candidate>>,
  prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  content:        Option<CandidateContent>,
  finish_reason:  Option<String>,
  #[serde(default)]
  safety_ratings: Vec<WireSafetyRating>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
  block_reason:   Option<String>,
  #[serde(default)]
  safety_ratings: Vec<WireSafetyRating>,
}

#[derive(Debug, Deserialize)]
struct WireSafetyRating {
  category:    String,
  probability: String,
}

fn ratings(wire: Vec<WireSafetyRating>) -> Vec<SafetyRating> {
  wire
    .into_iter()
    .map(|r| SafetyRating { category: r.category, probability: r.probability })
    .collect()
}

/// Interpret a `generateContent` response body.
///
/// The first part of the first candidate wins. A response without
/// candidates but with prompt feedback is a refusal, as is a lone candidate
/// that stopped for safety reasons without producing text.
pub fn parse_completion(body: &str) -> Result<Completion> {
  let response: GenerateContentResponse =
    serde_json::from_str(body).map_err(|e| Error::MalformedResponse(e.to_string()))?;

  if let Some(candidates) = response.candidates {
    let Some(first) = candidates.into_iter().next() else {
      return Err(Error::MalformedResponse("empty candidate list".into()));
    };

    let text = first
      .content
      .and_then(|c| c.parts.into_iter().next())
      .and_then(|p| p.text);

    return match (text, first.finish_reason) {
      (Some(text), _) => Ok(Completion::Candidate(text)),
      (None, Some(reason)) if reason == "SAFETY" => Ok(Completion::Blocked(SafetyFeedback {
        block_reason: Some(reason),
        ratings:      ratings(first.safety_ratings),
      })),
      (None, reason) => Err(Error::MalformedResponse(format!(
        "candidate has no text (finish reason: {})",
        reason.as_deref().unwrap_or("none")
      ))),
    };
  }

  match response.prompt_feedback {
    Some(feedback) => Ok(Completion::Blocked(SafetyFeedback {
      block_reason: feedback.block_reason,
      ratings:      ratings(feedback.safety_ratings),
    })),
    None => Err(Error::MalformedResponse("neither candidates nor prompt feedback".into())),
  }
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
  embedding: Option<Embedding>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
  values: Vec<f32>,
}

/// Interpret an `embedContent` response body.
pub fn parse_embedding(body: &str) -> Result<Vec<f32>> {
  let response: EmbedContentResponse =
    serde_json::from_str(body).map_err(|e| Error::MalformedResponse(e.to_string()))?;
  match response.embedding {
    Some(embedding) if !embedding.values.is_empty() => Ok(embedding.values),
    Some(_) => Err(Error::MalformedResponse("empty embedding".into())),
    None => Err(Error::MalformedResponse("missing embedding".into())),
  }
}
