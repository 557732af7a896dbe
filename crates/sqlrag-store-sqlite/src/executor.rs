//! [`SqliteExecutor`], which runs generated SQL against the relational store.

use std::path::PathBuf;

use rusqlite::OpenFlags;
use tracing::{debug, warn};

use sqlrag_core::{
  Error as CoreError,
  query::{QueryExecutor, QueryResult},
};

use crate::encode::cell_value;

/// Executes SQL through a read-only connection scoped to one call.
///
/// The connection is opened with `SQLITE_OPEN_READ_ONLY`, switched to
/// `query_only`, and any statement SQLite does not report as read-only is
/// refused before it is stepped. The connection is closed when the call
/// ends, on success and failure alike.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
  path: PathBuf,
}

impl SqliteExecutor {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

fn read_only_flags() -> OpenFlags {
  OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

/// Failures SQLite itself reports (bad SQL, missing table, refused write,
/// unreadable file) are database errors; anything else went wrong around it.
fn to_core_error(e: tokio_rusqlite::Error) -> CoreError {
  match e {
    tokio_rusqlite::Error::Rusqlite(e) => CoreError::Database(e.to_string()),
    other => CoreError::Execution(other.to_string()),
  }
}

fn run_query(conn: &mut rusqlite::Connection, sql: &str) -> tokio_rusqlite::Result<QueryResult> {
  conn.pragma_update(None, "query_only", true)?;

  let mut stmt = conn.prepare(sql)?;
  if !stmt.readonly() {
    return Err(rusqlite::Error::InvalidQuery.into());
  }

  let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
  let width = columns.len();
  let rows = stmt
    .query_map([], |row| {
      (0..width)
        .map(|i| row.get_ref(i).map(cell_value))
        .collect::<rusqlite::Result<Vec<_>>>()
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(QueryResult { columns, rows })
}

impl QueryExecutor for SqliteExecutor {
  async fn execute(&self, sql: &str) -> sqlrag_core::Result<QueryResult> {
    let conn = tokio_rusqlite::Connection::open_with_flags(&self.path, read_only_flags())
      .await
      .map_err(to_core_error)?;

    let owned = sql.to_owned();
    let outcome = conn.call(move |conn| run_query(conn, &owned)).await;

    if let Err(e) = conn.close().await {
      warn!(error = %e, path = %self.path.display(), "failed to close query connection");
    }

    let result = outcome.map_err(to_core_error)?;
    debug!(columns = result.columns.len(), rows = result.rows.len(), "query executed");
    Ok(result)
  }
}
