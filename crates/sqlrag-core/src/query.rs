//! Query results and the [`QueryExecutor`] trait.
//!
//! The executor is implemented by relational backends (e.g.
//! `sqlrag-store-sqlite`). It runs generated SQL verbatim; validation happens
//! before it is called.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};

use crate::Result;

/// A single value read from a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
  Blob(Vec<u8>),
}

impl fmt::Display for CellValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => f.write_str("NULL"),
      Self::Integer(i) => write!(f, "{i}"),
      Self::Real(r) => write!(f, "{r}"),
      Self::Text(s) => f.write_str(s),
      Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
    }
  }
}

/// Rows returned by a statement, with the column names from its descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
  /// Empty when the statement produced no result set.
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<CellValue>>,
}

impl QueryResult {
  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// Render row `index` as `col: value, col: value`.
  ///
  /// Cells without a matching column name are ignored.
  pub fn render_row(&self, index: usize) -> Option<String> {
    let row = self.rows.get(index)?;
    let parts: Vec<String> = self
      .columns
      .iter()
      .zip(row)
      .map(|(col, val)| format!("{col}: {val}"))
      .collect();
    Some(parts.join(", "))
  }
}

/// Abstraction over a relational store that runs generated SQL.
pub trait QueryExecutor: Send + Sync {
  /// Run `sql` as a complete statement.
  ///
  /// Store-level failures are reported as [`crate::Error::Database`]; any
  /// other failure as [`crate::Error::Execution`].
  fn execute<'a>(
    &'a self,
    sql: &'a str,
  ) -> impl Future<Output = Result<QueryResult>> + Send + 'a;
}
