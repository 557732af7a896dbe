//! SQLite backends for the sqlrag pipeline.
//!
//! - [`SqliteExecutor`] runs generated SQL against the relational store
//!   through a read-only connection opened per call.
//! - [`SqliteVectorStore`] persists embedded result documents and answers
//!   nearest-neighbour queries.
//!
//! Both wrap [`tokio_rusqlite`] so database work runs off the async
//! runtime's worker threads.

mod encode;
mod executor;
mod schema;
mod vectors;

pub mod error;
pub mod seed;

pub use error::{Error, Result};
pub use executor::SqliteExecutor;
pub use vectors::SqliteVectorStore;
