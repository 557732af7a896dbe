//! Error type for `sqlrag-gemini`.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no API key configured")]
  MissingApiKey,

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("API returned {status}: {body}")]
  Status { status: StatusCode, body: String },

  #[error("malformed response: {0}")]
  MalformedResponse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
