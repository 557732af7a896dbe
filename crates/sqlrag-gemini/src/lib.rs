//! Gemini REST client implementing the sqlrag model traits.
//!
//! [`GeminiClient`] calls `models/{model}:generateContent` for
//! [`TextModel`](sqlrag_core::model::TextModel) and
//! `models/{model}:embedContent` for
//! [`EmbeddingModel`](sqlrag_core::model::EmbeddingModel).

#![allow(async_fn_in_trait)]

mod client;
mod config;
mod wire;

pub mod error;

pub use client::GeminiClient;
pub use config::{
  DEFAULT_API_BASE, DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, DEFAULT_TIMEOUT, GeminiConfig,
};
pub use error::{Error, Result};
