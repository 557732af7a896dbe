//! Core types, collaborator traits and the question-answering pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! model provider, the relational store and the vector index are traits
//! implemented by other crates and injected into [`Pipeline`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod gate;
pub mod generation;
pub mod index;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod results;
pub mod semantic;
pub mod turn;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use generation::GenerationClient;
pub use pipeline::{NO_EVIDENCE, Pipeline, PipelineSettings};
pub use semantic::SemanticLayer;
pub use turn::{AbortReason, Turn, TurnStage};
