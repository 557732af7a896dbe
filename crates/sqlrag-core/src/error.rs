//! Error types for `sqlrag-core`.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::SafetyFeedback;

#[derive(Debug, Error)]
pub enum Error {
  #[error("semantic layer not found at {0}")]
  SemanticLayerNotFound(PathBuf),

  #[error("could not parse semantic layer {path}: {source}")]
  SemanticLayerParse {
    path:   PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("could not read semantic layer {path}: {source}")]
  SemanticLayerLoad {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid semantic layer: {0}")]
  InvalidSemanticLayer(String),

  #[error("generation failed: {0}")]
  GenerationFailed(String),

  #[error("generation blocked by safety filters: {0}")]
  SafetyBlocked(SafetyFeedback),

  #[error("embedding failed: {0}")]
  EmbeddingFailed(String),

  /// The relational store rejected or failed the statement.
  #[error("database error: {0}")]
  Database(String),

  /// Any other failure while running a statement.
  #[error("execution error: {0}")]
  Execution(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
