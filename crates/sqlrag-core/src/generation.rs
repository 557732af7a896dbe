//! Generation client: SQL synthesis, answer synthesis and embeddings.
//!
//! SQL generation fails closed: anything but a clean candidate is an error
//! and no SQL is attempted. Answer generation fails soft: the caller always
//! gets some user-facing text.

use std::sync::Arc;

use crate::{
  Error, Result,
  model::{
    Completion, CompletionRequest, EmbeddingModel, GenerationParams, TextModel,
  },
};

/// Returned by [`GenerationClient::generate_answer`] when the response
/// could not be parsed.
pub const ANSWER_PROCESSING_FALLBACK: &str =
  "Could not generate an answer due to a processing error.";
/// Returned when the answer prompt was refused by the provider.
pub const ANSWER_BLOCKED_FALLBACK: &str =
  "Could not generate an answer (possibly blocked by safety filters).";
/// Returned when the provider produced no usable text at all.
pub const ANSWER_EMPTY_FALLBACK: &str = "Could not generate a final answer.";

/// Wraps a model provider with the two prompts used by the pipeline.
///
/// Cheap to clone; the provider is shared behind an [`Arc`].
pub struct GenerationClient<M> {
  model:         Arc<M>,
  sql_params:    GenerationParams,
  answer_params: GenerationParams,
}

impl<M> Clone for GenerationClient<M> {
  fn clone(&self) -> Self {
    Self {
      model:         Arc::clone(&self.model),
      sql_params:    self.sql_params,
      answer_params: self.answer_params,
    }
  }
}

impl<M> GenerationClient<M> {
  pub fn new(model: Arc<M>) -> Self {
    Self {
      model,
      sql_params: GenerationParams::default(),
      answer_params: GenerationParams::default(),
    }
  }

  /// Override the sampling parameters for the SQL and answer prompts.
  pub fn with_params(mut self, sql: GenerationParams, answer: GenerationParams) -> Self {
    self.sql_params = sql;
    self.answer_params = answer;
    self
  }
}

// ─── Prompts ─────────────────────────────────────────────────────────────────

pub fn sql_prompt(question: &str, schema_text: &str) -> String {
  format!(
    "You translate questions about a database into SQL.\n\
     Write exactly one valid SQLite query that answers the question, using the \
     schema description below.\n\
     Use the technical table and column names; map human terms to them using \
     the aliases and descriptions.\n\
     When a column has a value mapping, filter on the stored code, not the \
     human meaning.\n\
     Only read data: the query must be a SELECT (optionally with a WITH clause).\n\
     Return the SQL query only, with no explanation and no markdown.\n\
     \n\
     Schema:\n\
     {schema_text}\n\
     Question:\n\
     {question}\n\
     \n\
     SQL:\n"
  )
}

pub fn answer_prompt(question: &str, evidence: &str) -> String {
  format!(
    "You help a user understand data.\n\
     The user asked: \"{question}\"\n\
     The following data was retrieved for this question:\n\
     ---\n\
     {evidence}\n\
     ---\n\
     Answer the question clearly and concisely using only this data.\n\
     If the data is empty or does not relate to the question, say that no \
     relevant information was found.\n\
     Do not mention SQL, queries, table names, column names or any other \
     technical database detail in the answer.\n"
  )
}

/// Trim the raw response and strip a surrounding markdown code fence.
pub fn clean_sql(raw: &str) -> String {
  let mut sql = raw.trim();
  if let Some(rest) = sql.strip_prefix("```") {
    // Drop an optional language tag such as `sql` on the fence line.
    let rest = rest
      .strip_prefix("sqlite")
      .or_else(|| rest.strip_prefix("sql"))
      .or_else(|| rest.strip_prefix("SQL"))
      .unwrap_or(rest);
    sql = rest.trim_start();
  }
  if let Some(rest) = sql.strip_suffix("```") {
    sql = rest;
  }
  sql.trim().to_owned()
}

// ─── Text generation ─────────────────────────────────────────────────────────

impl<M: TextModel> GenerationClient<M> {
  /// Translate `question` into one SQL statement, grounded on `schema_text`.
  ///
  /// Fails with [`Error::SafetyBlocked`] on a refusal and
  /// [`Error::GenerationFailed`] on any other unusable response.
  pub async fn generate_sql(&self, question: &str, schema_text: &str) -> Result<String> {
    let request = CompletionRequest::new(sql_prompt(question, schema_text))
      .with_params(self.sql_params);

    let completion = self
      .model
      .complete(&request)
      .await
      .map_err(|e| Error::GenerationFailed(e.to_string()))?;

    match completion {
      Completion::Candidate(text) => {
        let sql = clean_sql(&text);
        if sql.is_empty() {
          return Err(Error::GenerationFailed("response contained no SQL".into()));
        }
        tracing::info!(%sql, "generated SQL");
        Ok(sql)
      }
      Completion::Blocked(feedback) => {
        tracing::warn!(%feedback, "SQL generation blocked by safety filters");
        Err(Error::SafetyBlocked(feedback))
      }
    }
  }

  fn answer_request(&self, question: &str, evidence: &str) -> CompletionRequest {
    CompletionRequest::new(answer_prompt(question, evidence)).with_params(self.answer_params)
  }

  /// Synthesise an answer from `evidence`; never returns empty text.
  ///
  /// Failures are logged and replaced by one of the fallback messages.
  pub async fn generate_answer(&self, question: &str, evidence: &str) -> String {
    let request = self.answer_request(question, evidence);

    match self.model.complete(&request).await {
      Ok(Completion::Candidate(text)) if !text.trim().is_empty() => text.trim().to_owned(),
      Ok(Completion::Candidate(_)) => {
        tracing::warn!("answer generation returned no text");
        ANSWER_EMPTY_FALLBACK.to_owned()
      }
      Ok(Completion::Blocked(feedback)) => {
        tracing::warn!(%feedback, "answer generation blocked by safety filters");
        ANSWER_BLOCKED_FALLBACK.to_owned()
      }
      Err(e) => {
        tracing::warn!(error = %e, "answer generation failed");
        ANSWER_PROCESSING_FALLBACK.to_owned()
      }
    }
  }
}

// ─── Embeddings ──────────────────────────────────────────────────────────────

impl<M: EmbeddingModel> GenerationClient<M> {
  /// Embed `text`. Blank input yields `Ok(None)` without calling the
  /// provider.
  pub async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
    if text.trim().is_empty() {
      return Ok(None);
    }

    let vector = self
      .model
      .embed(text)
      .await
      .map_err(|e| Error::EmbeddingFailed(e.to_string()))?;

    if vector.is_empty() {
      return Err(Error::EmbeddingFailed("provider returned an empty vector".into()));
    }
    Ok(Some(vector))
  }
}
