//! Conversions between domain types and SQLite column values.
//!
//! UUIDs are stored as hyphenated lowercase strings. Timestamps are RFC 3339
//! UTC strings with a fixed microsecond width, so string comparison in SQL
//! orders them correctly. Embeddings are little-endian `f32` blobs.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::ValueRef;
use sqlrag_core::{index::ResultDocument, query::CellValue};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Embeddings ──────────────────────────────────────────────────────────────

pub fn encode_vector(vector: &[f32]) -> Result<Vec<u8>> {
  if vector.is_empty() {
    return Err(Error::InvalidVector("empty vector".into()));
  }
  if let Some(i) = vector.iter().position(|v| !v.is_finite()) {
    return Err(Error::InvalidVector(format!("non-finite component at index {i}")));
  }
  Ok(vector.iter().flat_map(|v| v.to_le_bytes()).collect())
}

pub fn decode_vector(blob: &[u8], dimension: usize) -> Result<Vec<f32>> {
  if dimension.checked_mul(4) != Some(blob.len()) {
    return Err(Error::InvalidVector(format!(
      "blob of {} bytes does not hold {dimension} components",
      blob.len()
    )));
  }
  Ok(
    blob
      .chunks_exact(4)
      .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
      .collect(),
  )
}

// ─── Cells ───────────────────────────────────────────────────────────────────

pub fn cell_value(value: ValueRef<'_>) -> CellValue {
  match value {
    ValueRef::Null => CellValue::Null,
    ValueRef::Integer(i) => CellValue::Integer(i),
    ValueRef::Real(r) => CellValue::Real(r),
    ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
    ValueRef::Blob(b) => CellValue::Blob(b.to_vec()),
  }
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// A `result_documents` row as SQLite hands it back.
pub struct RawDocument {
  pub doc_id:    String,
  pub turn_id:   String,
  pub row_index: i64,
  pub text:      String,
  pub dimension: i64,
  pub embedding: Vec<u8>,
  pub stored_at: String,
}

impl RawDocument {
  pub const COLUMNS: &'static str =
    "doc_id, turn_id, row_index, text, dimension, embedding, stored_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      doc_id:    row.get(0)?,
      turn_id:   row.get(1)?,
      row_index: row.get(2)?,
      text:      row.get(3)?,
      dimension: row.get(4)?,
      embedding: row.get(5)?,
      stored_at: row.get(6)?,
    })
  }

  pub fn into_document(self) -> Result<ResultDocument> {
    let row_index = usize::try_from(self.row_index)
      .map_err(|_| Error::InvalidValue(format!("row_index {}", self.row_index)))?;
    let dimension = usize::try_from(self.dimension)
      .map_err(|_| Error::InvalidValue(format!("dimension {}", self.dimension)))?;

    Ok(ResultDocument {
      turn_id: decode_uuid(&self.turn_id)?,
      row_index,
      embedding: decode_vector(&self.embedding, dimension)?,
      stored_at: decode_dt(&self.stored_at)?,
      doc_id: self.doc_id,
      text: self.text,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_have_fixed_width() {
    let whole = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let fractional = whole + chrono::TimeDelta::microseconds(1500);
    assert_eq!(encode_dt(whole), "2024-03-01T12:00:00.000000Z");
    assert_eq!(encode_dt(fractional), "2024-03-01T12:00:00.001500Z");
    assert!(encode_dt(whole) < encode_dt(fractional));
    assert_eq!(decode_dt(&encode_dt(fractional)).unwrap(), fractional);
  }

  #[test]
  fn vectors_are_little_endian_f32() {
    let blob = encode_vector(&[1.0, -2.5]).unwrap();
    assert_eq!(blob.len(), 8);
    assert_eq!(&blob[..4], &1.0f32.to_le_bytes());
    assert_eq!(decode_vector(&blob, 2).unwrap(), vec![1.0, -2.5]);
    assert!(decode_vector(&blob, 3).is_err());
  }

  #[test]
  fn oversized_dimension_does_not_overflow() {
    let blob = encode_vector(&[1.0]).unwrap();
    assert!(matches!(decode_vector(&blob, usize::MAX), Err(Error::InvalidVector(_))));
    assert!(matches!(decode_vector(&blob, usize::MAX / 4 + 1), Err(Error::InvalidVector(_))));
  }

  #[test]
  fn degenerate_vectors_are_refused() {
    assert!(matches!(encode_vector(&[]), Err(Error::InvalidVector(_))));
    assert!(matches!(encode_vector(&[1.0, f32::NAN]), Err(Error::InvalidVector(_))));
  }

  #[test]
  fn text_cells_tolerate_invalid_utf8() {
    assert_eq!(cell_value(ValueRef::Text(b"Texas")), CellValue::Text("Texas".into()));
    assert_eq!(cell_value(ValueRef::Text(&[0x66, 0xff])), CellValue::Text("f\u{fffd}".into()));
    assert_eq!(cell_value(ValueRef::Null), CellValue::Null);
  }
}
