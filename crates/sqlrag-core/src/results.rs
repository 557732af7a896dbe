//! [`ResultStore`] turns query rows into searchable evidence.
//!
//! Storing never fails a turn: rows whose embedding fails are dropped and
//! counted, and a failed upsert stores nothing. Retrieval degrades to "no
//! evidence" on any failure.

use chrono::{DateTime, TimeDelta, Utc};
use futures::{StreamExt as _, stream};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  generation::GenerationClient,
  index::{NearestQuery, ResultDocument, VectorIndex, document_id},
  model::EmbeddingModel,
  query::QueryResult,
};

/// Default number of embedding calls in flight while storing a turn.
pub const DEFAULT_EMBED_CONCURRENCY: usize = 4;

/// Which stored documents a retrieval may see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetentionPolicy {
  /// Keep everything; any earlier turn may contribute evidence.
  #[default]
  Unbounded,
  /// Retrieve only from the documents stored by the current turn.
  PerTurn,
  /// Evict documents older than `seconds` before every retrieval.
  Ttl { seconds: u64 },
}

impl RetentionPolicy {
  /// Oldest `stored_at` still visible at `now`, if the policy has one.
  pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match *self {
      Self::Ttl { seconds } => {
        let secs = i64::try_from(seconds).unwrap_or(i64::MAX);
        let ttl = TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX);
        Some(now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC))
      }
      Self::Unbounded | Self::PerTurn => None,
    }
  }
}

/// Embeds result rows into a [`VectorIndex`] and retrieves them by
/// similarity.
pub struct ResultStore<M, V> {
  generation:  GenerationClient<M>,
  index:       V,
  retention:   RetentionPolicy,
  concurrency: usize,
}

impl<M, V> ResultStore<M, V> {
  pub fn new(generation: GenerationClient<M>, index: V) -> Self {
    Self {
      generation,
      index,
      retention: RetentionPolicy::default(),
      concurrency: DEFAULT_EMBED_CONCURRENCY,
    }
  }

  pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
    self.retention = retention;
    self
  }

  /// Maximum number of embedding calls in flight; clamped to at least one.
  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  pub fn index(&self) -> &V { &self.index }
}

impl<M, V> ResultStore<M, V>
where
  M: EmbeddingModel,
  V: VectorIndex,
{
  /// Embed and persist every row of `result` under `turn_id`.
  ///
  /// Returns the number of documents actually stored. Zero when there are
  /// no rows or no columns.
  pub async fn store(&self, result: &QueryResult, turn_id: Uuid) -> usize {
    if result.rows.is_empty() || result.columns.is_empty() {
      tracing::debug!(%turn_id, "no rows to store");
      return 0;
    }

    let rendered: Vec<(usize, String)> = (0..result.rows.len())
      .filter_map(|i| result.render_row(i).map(|text| (i, text)))
      .collect();

    // `buffered` yields in input order, so ids stay aligned with rows.
    let embeddings: Vec<Option<Vec<f32>>> = stream::iter(&rendered)
      .map(|(row_index, text)| async move {
        match self.generation.embed(text).await {
          Ok(vector) => vector,
          Err(e) => {
            tracing::warn!(%turn_id, row_index, error = %e, "row embedding failed");
            None
          }
        }
      })
      .buffered(self.concurrency)
      .collect()
      .await;

    let stored_at = Utc::now();
    let total = rendered.len();
    let documents: Vec<ResultDocument> = rendered
      .into_iter()
      .zip(embeddings)
      .filter_map(|((row_index, text), embedding)| {
        Some(ResultDocument {
          doc_id: document_id(turn_id, row_index),
          turn_id,
          row_index,
          text,
          embedding: embedding?,
          stored_at,
        })
      })
      .collect();

    let dropped = total - documents.len();
    if dropped > 0 {
      tracing::warn!(%turn_id, dropped, total, "dropped rows without embeddings");
    }
    if documents.is_empty() {
      return 0;
    }

    match self.index.upsert(documents).await {
      Ok(count) => {
        tracing::info!(%turn_id, count, "stored result documents");
        count
      }
      Err(e) => {
        tracing::warn!(%turn_id, error = %e, "vector upsert failed");
        0
      }
    }
  }

  /// Return the texts of the `k` documents nearest to `query_text`,
  /// nearest first, subject to the retention policy.
  ///
  /// `current_turn` scopes the search under [`RetentionPolicy::PerTurn`].
  pub async fn retrieve(&self, query_text: &str, k: usize, current_turn: Uuid) -> Vec<String> {
    let vector = match self.generation.embed(query_text).await {
      Ok(Some(vector)) => vector,
      Ok(None) => return Vec::new(),
      Err(e) => {
        tracing::warn!(error = %e, "query embedding failed; continuing without evidence");
        return Vec::new();
      }
    };

    let mut query = NearestQuery::new(vector, k);
    match self.retention {
      RetentionPolicy::Unbounded => {}
      RetentionPolicy::PerTurn => query.turn_id = Some(current_turn),
      RetentionPolicy::Ttl { .. } => {
        if let Some(cutoff) = self.retention.cutoff(Utc::now()) {
          match self.index.evict_before(cutoff).await {
            Ok(0) => {}
            Ok(evicted) => tracing::info!(evicted, "evicted expired result documents"),
            Err(e) => tracing::warn!(error = %e, "eviction failed"),
          }
          query.stored_after = Some(cutoff);
        }
      }
    }

    match self.index.query(&query).await {
      Ok(hits) => {
        tracing::info!(retrieved = hits.len(), "retrieved result documents");
        hits.into_iter().map(|hit| hit.document.text).collect()
      }
      Err(e) => {
        tracing::warn!(error = %e, "vector query failed");
        Vec::new()
      }
    }
  }
}
