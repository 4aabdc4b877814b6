//! # table-rag
//!
//! Ingests document archives into page-aware retrieval nodes.
//!
//! Every source document arrives as one zip archive holding page-numbered
//! text fragments, page-numbered HTML fragments that each carry a data
//! table, and optional image metadata. The pipeline turns them into a single
//! ordered list of [`ContentNode`](table_rag_core::models::ContentNode)s and
//! hands that list to an index backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────┐
//! │ archives │──▶│ ArchiveWalker│──▶│ Synthesizer│──▶│ Splitter │
//! │  *.zip   │   │ tables/images│   │  PDF pages │   │  chunks  │
//! └──────────┘   └──────┬───────┘   └────────────┘   └────┬─────┘
//!                       │                                 │
//!                       ▼                                 ▼
//!                  ┌─────────────────────────────────────────┐
//!                  │ assemble: (page, kind) ordered nodes     │
//!                  └───────────────────┬─────────────────────┘
//!                                      ▼
//!                     persist dir (SQLite)  or  StorageContext
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! trag --config ./config/trag.toml build
//! trag --config ./config/trag.toml stats
//! trag --config ./config/trag.toml show report-2023 --blank-tables
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`archive`] | Archive traversal and member routing |
//! | [`render`] | Synthetic PDF writer |
//! | [`synth`] | Page text → paginated document |
//! | [`ingest`] | Index build orchestration |
//! | [`persist`] | On-disk snapshots |
//! | [`sqlite_store`] | SQLite `VectorStore` |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Error taxonomy |

pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod persist;
pub mod render;
pub mod sqlite_store;
pub mod stats;
pub mod show;
pub mod synth;

pub use error::{Error, Result};
pub use ingest::{build_index, BuildOptions, BuildReport};
pub use persist::{load_index, Manifest, PersistedIndex};
