//! # Context Scanner
//!
//! Indexes a directory tree into a local vector index and assembles
//! token-budgeted context for language-model prompts.
//!
//! The pipeline itself (chunking, the embedding and index ports, indexing,
//! retrieval, and budgeted assembly) lives in `context-scanner-core`. This
//! crate supplies the concrete adapters and the `ctxscan` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Filesystem  │──▶│ Chunk+Embed  │──▶│  SQLite   │
//! │  (walkdir)  │   │  (batched)   │   │  vectors  │
//! └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                            │
//!                        query ──▶ embed ──▶ nearest n ──▶ budgeted context
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connector_fs`] | Directory walk, ignore globs, concurrent reads |
//! | [`embedding`] | Hash, Ollama, and OpenAI embedding providers |
//! | [`sqlite_store`] | SQLite-backed vector index |
//! | [`ingest`] | `index` command orchestration |
//! | [`search`] | Query-time retrieval with a timeout |
//! | [`context`] | Budgeted context assembly |
//! | [`generate`] | `ask` command |
//! | [`stats`] | Index statistics |
//! | [`progress`] | Indexing progress on stderr |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod connector_fs;
pub mod context;
pub mod db;
pub mod embedding;
pub mod generate;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod search;
pub mod sqlite_store;
pub mod stats;
#[cfg(feature = "exact-tokens")]
pub mod tokens;
