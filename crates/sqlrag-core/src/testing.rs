//! In-memory doubles of the collaborator traits, for unit tests.

use std::sync::{
  Mutex,
  atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  Error, Result,
  index::{NearestQuery, ResultDocument, ScoredDocument, VectorIndex, cosine_similarity},
  model::{Completion, CompletionRequest, EmbeddingModel, TextModel},
  query::{QueryExecutor, QueryResult},
};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ScriptError(pub String);

const DIMS: usize = 32;

/// Bag-of-words embedding: every token bumps one hashed dimension.
pub fn toy_embedding(text: &str) -> Vec<f32> {
  let mut v = vec![0.0; DIMS];
  for token in text
    .split(|c: char| !(c.is_alphanumeric() || c == '_'))
    .filter(|t| !t.is_empty())
  {
    let hash = token
      .to_lowercase()
      .bytes()
      .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3));
    v[(hash % DIMS as u64) as usize] += 1.0;
  }
  v
}

// ─── Model ───────────────────────────────────────────────────────────────────

/// A model that answers SQL and answer prompts from a script.
pub struct ScriptedModel {
  sql:         Result<Completion, String>,
  answer:      Result<Completion, String>,
  poison:      Vec<String>,
  requests:    Mutex<Vec<CompletionRequest>>,
  embed_calls: AtomicUsize,
}

impl Default for ScriptedModel {
  fn default() -> Self {
    Self {
      sql:         Ok(Completion::Candidate("SELECT 1".into())),
      answer:      Ok(Completion::Candidate("Here is what I found.".into())),
      poison:      Vec::new(),
      requests:    Mutex::new(Vec::new()),
      embed_calls: AtomicUsize::new(0),
    }
  }
}

impl ScriptedModel {
  pub fn on_sql(mut self, response: Result<Completion, String>) -> Self {
    self.sql = response;
    self
  }

  pub fn on_answer(mut self, response: Result<Completion, String>) -> Self {
    self.answer = response;
    self
  }

  /// Fail every embedding whose text contains `needle`.
  pub fn failing_embeddings_for(mut self, needle: &str) -> Self {
    self.poison.push(needle.to_owned());
    self
  }

  pub fn embed_calls(&self) -> usize { self.embed_calls.load(Ordering::SeqCst) }

  pub fn requests(&self) -> Vec<CompletionRequest> { self.requests.lock().unwrap().clone() }

  pub fn prompts(&self) -> Vec<String> {
    self.requests().into_iter().map(|r| r.prompt).collect()
  }
}

impl TextModel for ScriptedModel {
  type Error = ScriptError;

  async fn complete(
    &self,
    request: &CompletionRequest,
  ) -> Result<Completion, ScriptError> {
    self.requests.lock().unwrap().push(request.clone());
    let scripted = if request.prompt.starts_with("You translate") {
      &self.sql
    } else {
      &self.answer
    };
    scripted.clone().map_err(ScriptError)
  }
}

impl EmbeddingModel for ScriptedModel {
  type Error = ScriptError;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, ScriptError> {
    self.embed_calls.fetch_add(1, Ordering::SeqCst);
    if self.poison.iter().any(|p| text.contains(p.as_str())) {
      return Err(ScriptError(format!("cannot embed {text:?}")));
    }
    Ok(toy_embedding(text))
  }
}

// ─── Index ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryIndex {
  documents: Mutex<Vec<ResultDocument>>,
  failing:   bool,
}

impl MemoryIndex {
  pub fn failing() -> Self { Self { failing: true, ..Self::default() } }

  pub fn documents(&self) -> Vec<ResultDocument> { self.documents.lock().unwrap().clone() }

  /// Move every document of `turn_id` back in time by `by`.
  pub fn backdate(&self, turn_id: Uuid, by: TimeDelta) {
    for doc in self.documents.lock().unwrap().iter_mut() {
      if doc.turn_id == turn_id {
        doc.stored_at -= by;
      }
    }
  }

  fn check(&self) -> Result<(), ScriptError> {
    if self.failing {
      Err(ScriptError("index unavailable".into()))
    } else {
      Ok(())
    }
  }
}

impl VectorIndex for MemoryIndex {
  type Error = ScriptError;

  async fn upsert(&self, documents: Vec<ResultDocument>) -> Result<usize, ScriptError> {
    self.check()?;
    let mut stored = self.documents.lock().unwrap();
    let count = documents.len();
    for doc in documents {
      stored.retain(|d| d.doc_id != doc.doc_id);
      stored.push(doc);
    }
    Ok(count)
  }

  async fn query(&self, query: &NearestQuery) -> Result<Vec<ScoredDocument>, ScriptError> {
    self.check()?;
    let stored = self.documents.lock().unwrap();
    let mut hits: Vec<ScoredDocument> = stored
      .iter()
      .filter(|d| query.turn_id.is_none_or(|t| d.turn_id == t))
      .filter(|d| query.stored_after.is_none_or(|at| d.stored_at >= at))
      .filter_map(|d| {
        cosine_similarity(&query.vector, &d.embedding)
          .map(|score| ScoredDocument { document: d.clone(), score })
      })
      .collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(query.k);
    Ok(hits)
  }

  async fn evict_before(&self, cutoff: DateTime<Utc>) -> Result<usize, ScriptError> {
    self.check()?;
    let mut stored = self.documents.lock().unwrap();
    let before = stored.len();
    stored.retain(|d| d.stored_at >= cutoff);
    Ok(before - stored.len())
  }
}

// ─── Executor ────────────────────────────────────────────────────────────────

/// Returns a scripted result and counts how often it was asked to run SQL.
pub struct RecordingExecutor {
  result:   Mutex<Option<Result<QueryResult>>>,
  executed: Mutex<Vec<String>>,
}

impl RecordingExecutor {
  pub fn returning(result: Result<QueryResult>) -> Self {
    Self { result: Mutex::new(Some(result)), executed: Mutex::new(Vec::new()) }
  }

  pub fn executed(&self) -> Vec<String> { self.executed.lock().unwrap().clone() }
}

impl QueryExecutor for RecordingExecutor {
  async fn execute(&self, sql: &str) -> Result<QueryResult> {
    self.executed.lock().unwrap().push(sql.to_owned());
    let scripted = self.result.lock().unwrap().take();
    scripted.unwrap_or_else(|| Err(Error::Execution("no scripted result left".into())))
  }
}
