//! # Context Scanner Core
//!
//! Runtime-agnostic logic for Context Scanner: data models, chunking,
//! the vector index abstraction, the indexing pipeline, retrieval, and
//! token-budgeted context assembly.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Embedding
//! backends and persistent index storage are supplied by the caller
//! through the [`embedding::EmbeddingProvider`] and
//! [`store::VectorIndex`] traits.
//!
//! ```text
//!  Document ──▶ chunk ──▶ embed (batched) ──▶ VectorIndex::upsert
//!                                                  │
//!  query ──▶ embed ──▶ VectorIndex::query ──▶ assemble ──▶ context
//! ```

pub mod assemble;
pub mod cancel;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod store;

pub use error::{Result, ScanError};
