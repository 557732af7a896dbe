//! Result documents and the [`VectorIndex`] trait.
//!
//! A result document is one query row, rendered to text and embedded. The
//! index is append-only from the pipeline's point of view: documents are
//! upserted by id and only removed by an explicit retention eviction.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Documents ───────────────────────────────────────────────────────────────

/// Unique id of row `row_index` stored by turn `turn_id`.
pub fn document_id(turn_id: Uuid, row_index: usize) -> String {
  format!("{turn_id}_row_{row_index}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
  pub doc_id:    String,
  pub turn_id:   Uuid,
  pub row_index: usize,
  /// `col: value, col: value` rendering of the row.
  pub text:      String,
  pub embedding: Vec<f32>,
  pub stored_at: DateTime<Utc>,
}

/// A document returned from a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
  pub document: ResultDocument,
  /// Cosine similarity to the query vector; higher is nearer.
  pub score:    f32,
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`VectorIndex::query`].
#[derive(Debug, Clone, Default)]
pub struct NearestQuery {
  pub vector:       Vec<f32>,
  pub k:            usize,
  /// Only consider documents stored by this turn.
  pub turn_id:      Option<Uuid>,
  /// Only consider documents stored at or after this instant.
  pub stored_after: Option<DateTime<Utc>>,
}

impl NearestQuery {
  pub fn new(vector: Vec<f32>, k: usize) -> Self {
    Self { vector, k, ..Self::default() }
  }
}

/// Cosine similarity of two vectors; `None` on length mismatch or a zero
/// vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
  if a.len() != b.len() || a.is_empty() {
    return None;
  }

  let mut dot = 0.0f64;
  let mut norm_a = 0.0f64;
  let mut norm_b = 0.0f64;
  for (&x, &y) in a.iter().zip(b) {
    let (x, y) = (f64::from(x), f64::from(y));
    dot += x * y;
    norm_a += x * x;
    norm_b += y * y;
  }

  let denom = norm_a.sqrt() * norm_b.sqrt();
  if denom == 0.0 {
    return None;
  }
  Some((dot / denom) as f32)
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a vector store backend.
pub trait VectorIndex: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert or replace `documents` as one batch; returns the number written.
  fn upsert(
    &self,
    documents: Vec<ResultDocument>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Return up to `query.k` documents, nearest first.
  fn query<'a>(
    &'a self,
    query: &'a NearestQuery,
  ) -> impl Future<Output = Result<Vec<ScoredDocument>, Self::Error>> + Send + 'a;

  /// Remove every document stored before `cutoff`; returns the number removed.
  fn evict_before(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
