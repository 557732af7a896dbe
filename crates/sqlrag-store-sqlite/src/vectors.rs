//! [`SqliteVectorStore`], the SQLite implementation of [`VectorIndex`].
//!
//! Candidate rows are narrowed in SQL by turn and age, then ranked by cosine
//! similarity in Rust. That is a linear scan, which is fine at the scale of
//! one chat session's results.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use sqlrag_core::index::{
  NearestQuery, ResultDocument, ScoredDocument, VectorIndex, cosine_similarity,
};

use crate::{
  Error, Result,
  encode::{RawDocument, encode_dt, encode_uuid, encode_vector},
  schema::SCHEMA,
};

/// Vector index backed by a single SQLite file.
///
/// Cloning is cheap; clones share one background connection.
#[derive(Clone)]
pub struct SqliteVectorStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteVectorStore {
  /// Open (or create) a store at `path`, creating parent directories as
  /// needed, and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    info!(path = %path.display(), "opened vector store");
    Ok(store)
  }

  /// Open an in-memory store. Its contents vanish with the last clone.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Close the underlying connection. Calls on any remaining clone fail
  /// afterwards.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    debug!("closed vector store");
    Ok(())
  }

  /// Number of stored documents.
  pub async fn count(&self) -> Result<usize> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM result_documents", [], |r| r.get(0))?)
      })
      .await?;
    usize::try_from(count).map_err(|_| Error::InvalidValue(format!("count {count}")))
  }
}

struct EncodedDocument {
  doc_id:    String,
  turn_id:   String,
  row_index: i64,
  text:      String,
  dimension: i64,
  embedding: Vec<u8>,
  stored_at: String,
}

impl EncodedDocument {
  fn new(doc: ResultDocument) -> Result<Self> {
    let embedding = encode_vector(&doc.embedding)?;
    let to_i64 =
      |n: usize, what: &str| i64::try_from(n).map_err(|_| Error::InvalidValue(format!("{what} {n}")));
    Ok(Self {
      row_index: to_i64(doc.row_index, "row_index")?,
      dimension: to_i64(doc.embedding.len(), "dimension")?,
      turn_id: encode_uuid(doc.turn_id),
      stored_at: encode_dt(doc.stored_at),
      doc_id: doc.doc_id,
      text: doc.text,
      embedding,
    })
  }
}

impl VectorIndex for SqliteVectorStore {
  type Error = Error;

  async fn upsert(&self, documents: Vec<ResultDocument>) -> Result<usize> {
    if documents.is_empty() {
      return Ok(0);
    }
    let encoded = documents
      .into_iter()
      .map(EncodedDocument::new)
      .collect::<Result<Vec<_>>>()?;

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO result_documents \
               (doc_id, turn_id, row_index, text, dimension, embedding, stored_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(doc_id) DO UPDATE SET \
               turn_id   = excluded.turn_id, \
               row_index = excluded.row_index, \
               text      = excluded.text, \
               dimension = excluded.dimension, \
               embedding = excluded.embedding, \
               stored_at = excluded.stored_at",
          )?;
          for doc in &encoded {
            stmt.execute(rusqlite::params![
              doc.doc_id,
              doc.turn_id,
              doc.row_index,
              doc.text,
              doc.dimension,
              doc.embedding,
              doc.stored_at,
            ])?;
          }
        }
        tx.commit()?;
        Ok(encoded.len())
      })
      .await?;

    debug!(written, "upserted result documents");
    Ok(written)
  }

  async fn query(&self, query: &NearestQuery) -> Result<Vec<ScoredDocument>> {
    if query.k == 0 {
      return Ok(Vec::new());
    }

    let turn = query.turn_id.map(encode_uuid);
    let after = query.stored_after.map(encode_dt);

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM result_documents \
           WHERE (?1 IS NULL OR turn_id = ?1) AND (?2 IS NULL OR stored_at >= ?2)",
          RawDocument::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![turn, after], RawDocument::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let candidates = raws.len();
    let mut hits = Vec::with_capacity(candidates);
    for raw in raws {
      let doc_id = raw.doc_id.clone();
      let document = match raw.into_document() {
        Ok(document) => document,
        Err(error) => {
          warn!(%doc_id, %error, "skipping unreadable stored document");
          continue;
        }
      };
      match cosine_similarity(&query.vector, &document.embedding) {
        Some(score) => hits.push(ScoredDocument { document, score }),
        None => debug!(doc_id = %document.doc_id, "skipping incomparable document"),
      }
    }

    hits.sort_by(|a, b| {
      b.score
        .total_cmp(&a.score)
        .then_with(|| a.document.doc_id.cmp(&b.document.doc_id))
    });
    hits.truncate(query.k);

    debug!(candidates, returned = hits.len(), "nearest-neighbour query");
    Ok(hits)
  }

  async fn evict_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
    let cutoff = encode_dt(cutoff);
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM result_documents WHERE stored_at < ?1",
          rusqlite::params![cutoff],
        )?)
      })
      .await?;

    if removed > 0 {
      debug!(removed, "evicted result documents");
    }
    Ok(removed)
  }
}
