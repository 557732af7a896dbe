//! Error type for `sqlrag-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid embedding vector: {0}")]
  InvalidVector(String),

  #[error("invalid stored value: {0}")]
  InvalidValue(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
